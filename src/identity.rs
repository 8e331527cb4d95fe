//! # Builder Identity and Lifecycle Status
//!
//! Every builder carries a process-unique [`BuilderId`] assigned at creation.
//! Identity is what cycle detection keys on: a traversal recognizes a builder
//! it has already entered by id, never by address or by value.
//!
//! Build and validation progress are tracked by two independent state
//! machines, [`BuildStatus`] and [`ValidationStatus`]. Both have a single
//! terminal state (`Built` / `Validated`); once reached, a builder never
//! leaves it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a builder.
///
/// Ids are allocated from a global counter, are never reused, and are stable
/// for the lifetime of the builder. They exist so that a traversal can detect
/// cycles: a [`VisitedSet`](crate::visited::VisitedSet) records the ids it has
/// entered and short-circuits on re-entry.
///
/// # Example
///
/// ```rust
/// use buildweave::builder::BuilderCore;
///
/// let a: BuilderCore<String> = BuilderCore::new();
/// let b: BuilderCore<String> = BuilderCore::new();
/// assert_ne!(a.id(), b.id());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuilderId(u64);

impl BuilderId {
  /// Allocates the next id from the global counter.
  pub(crate) fn next() -> Self {
    BuilderId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
  }
}

impl fmt::Display for BuilderId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Progress of a builder through its build lifecycle.
///
/// `Built` is terminal: once reached, the produced value is cached and never
/// changes. Note that a failed validation leaves the builder at `Building`
/// rather than resetting it - see [`Builder::build`](crate::builder::Builder::build).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
  /// No build has been started.
  NotBuilding,
  /// A build is in progress, or a previous build failed validation.
  Building,
  /// The value has been produced and cached. Terminal.
  Built,
}

/// Progress of a builder through its validation lifecycle.
///
/// `Validated` is terminal and is reached whether or not validation recorded
/// failures; the recorded failures, not the status, carry the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
  /// No validation has been started.
  NotValidated,
  /// The validation hook is currently running.
  Validating,
  /// The validation hook has run. Terminal.
  Validated,
}
