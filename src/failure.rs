//! # Structured Validation Failures
//!
//! Validation never throws and never stops at the first problem. Each hook
//! records zero or more [`Failure`] values into a caller-supplied
//! [`FailuresDictionary`], keyed by the field that failed, and the whole
//! graph is inspected before anything is reported.
//!
//! ## Core Types
//!
//! - **[`Failure`]**: one problem - an attached error, a plain message, or a
//!   child builder's own dictionary nested under the parent's field.
//! - **[`FailuresDictionary`]**: field name to ordered list of failures.
//!   A dictionary with any entry at all is "failing".
//! - **[`AggregateError`]**: the hard-failure conversion for callers that
//!   want one raised error instead of a result value. It walks the
//!   dictionary depth-first and reports every leaf, not just the first.
//!
//! ## Example
//!
//! ```rust
//! use buildweave::failure::{Failure, FailuresDictionary};
//!
//! let mut failures = FailuresDictionary::new();
//! failures.add_failure("name", Failure::from_message("must not be blank"));
//! failures.add_failure("age", Failure::from_message("must be non-negative"));
//!
//! assert!(failures.has_failures());
//! assert_eq!(failures.failure_count(), 2);
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// One validation or build failure.
///
/// This is a closed, exhaustive union: match on it directly and handle all
/// three variants. The `error`/`message`/`nested` accessors are for callers
/// that only care about one variant.
#[derive(Debug, Clone)]
pub enum Failure {
  /// An attached error object, e.g. one raised by a field predicate.
  Error(Arc<dyn StdError + Send + Sync>),
  /// A plain text message describing the problem.
  Message(String),
  /// A child builder's own failures, nested under the parent's field name.
  Nested(FailuresDictionary),
}

impl Failure {
  /// Wraps an error object.
  pub fn from_error(error: impl StdError + Send + Sync + 'static) -> Self {
    Failure::Error(Arc::new(error))
  }

  /// Wraps a plain message.
  pub fn from_message(message: impl Into<String>) -> Self {
    Failure::Message(message.into())
  }

  /// Wraps a child builder's failures.
  pub fn from_nested(failures: FailuresDictionary) -> Self {
    Failure::Nested(failures)
  }

  /// The attached error, if this is the `Error` variant.
  pub fn error(&self) -> Option<&Arc<dyn StdError + Send + Sync>> {
    match self {
      Failure::Error(error) => Some(error),
      _ => None,
    }
  }

  /// The message text, if this is the `Message` variant.
  pub fn message(&self) -> Option<&str> {
    match self {
      Failure::Message(message) => Some(message),
      _ => None,
    }
  }

  /// The nested dictionary, if this is the `Nested` variant.
  pub fn nested(&self) -> Option<&FailuresDictionary> {
    match self {
      Failure::Nested(failures) => Some(failures),
      _ => None,
    }
  }
}

impl fmt::Display for Failure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Failure::Error(error) => write!(f, "{error}"),
      Failure::Message(message) => write!(f, "{message}"),
      Failure::Nested(failures) => write!(f, "[{failures}]"),
    }
  }
}

/// Field-keyed aggregation of [`Failure`] entries.
///
/// Fields keep their first-insertion order, and the list under each field
/// keeps append order - the order failures are rendered is the order they
/// were recorded. The dictionary is "failing" exactly when it has at least
/// one entry.
#[derive(Debug, Clone, Default)]
pub struct FailuresDictionary {
  entries: Vec<(String, Vec<Failure>)>,
}

impl FailuresDictionary {
  /// Creates an empty (non-failing) dictionary.
  pub fn new() -> Self {
    FailuresDictionary {
      entries: Vec::new(),
    }
  }

  /// Appends `failure` under `field`, creating the field on first use.
  pub fn add_failure(&mut self, field: impl Into<String>, failure: Failure) {
    let field = field.into();
    match self.entries.iter_mut().find(|(name, _)| *name == field) {
      Some((_, failures)) => failures.push(failure),
      None => self.entries.push((field, vec![failure])),
    }
  }

  /// Nests a child builder's dictionary under `field` if it is failing.
  ///
  /// A non-failing child dictionary is discarded - an empty nested entry
  /// would itself count as a failure.
  pub fn merge_nested(&mut self, field: impl Into<String>, child: FailuresDictionary) {
    if child.has_failures() {
      self.add_failure(field, Failure::from_nested(child));
    }
  }

  /// Returns `true` if any failure has been recorded.
  pub fn has_failures(&self) -> bool {
    !self.entries.is_empty()
  }

  /// Total number of recorded failures across all fields.
  ///
  /// Nested dictionaries count as one entry each; the count is not
  /// recursive.
  pub fn failure_count(&self) -> usize {
    self.entries.iter().map(|(_, failures)| failures.len()).sum()
  }

  /// The failures recorded under `field`, if any.
  pub fn get(&self, field: &str) -> Option<&[Failure]> {
    self
      .entries
      .iter()
      .find(|(name, _)| name == field)
      .map(|(_, failures)| failures.as_slice())
  }

  /// Field names in first-insertion order.
  pub fn fields(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|(name, _)| name.as_str())
  }

  /// Iterates `(field, failures)` pairs in first-insertion order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &[Failure])> {
    self
      .entries
      .iter()
      .map(|(name, failures)| (name.as_str(), failures.as_slice()))
  }
}

impl fmt::Display for FailuresDictionary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for (field, failures) in self.iter() {
      for failure in failures {
        if !first {
          write!(f, "; ")?;
        }
        first = false;
        write!(f, "{field}: {failure}")?;
      }
    }
    Ok(())
  }
}

/// All failures of a dictionary aggregated into one raised error.
///
/// For callers that want a hard failure instead of inspecting a result
/// value. The display walks the dictionary depth-first, joining nested field
/// names with `.`, and lists **every** leaf failure rather than stopping at
/// the first.
#[derive(Error, Debug, Clone)]
pub struct AggregateError {
  failures: FailuresDictionary,
}

impl AggregateError {
  /// Aggregates `failures` into a single error.
  pub fn new(failures: FailuresDictionary) -> Self {
    AggregateError { failures }
  }

  /// The underlying dictionary.
  pub fn failures(&self) -> &FailuresDictionary {
    &self.failures
  }

}

impl fmt::Display for AggregateError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut lines = Vec::new();
    collect_leaves(&self.failures, "", &mut lines);
    write!(
      f,
      "build failed with {} failure(s): {}",
      lines.len(),
      lines.join("; ")
    )
  }
}

fn collect_leaves(failures: &FailuresDictionary, prefix: &str, lines: &mut Vec<String>) {
  for (field, entries) in failures.iter() {
    let path = if prefix.is_empty() {
      field.to_string()
    } else {
      format!("{prefix}.{field}")
    };
    for failure in entries {
      match failure {
        Failure::Nested(child) => collect_leaves(child, &path, lines),
        leaf => lines.push(format!("{path}: {leaf}")),
      }
    }
  }
}
