//! # Builder Lists
//!
//! An ordered, homogeneous collection of child builders with bulk
//! build/validate/reference-extraction operations. Insertion order is
//! preserved and is the order elements are later built and validated.
//!
//! Elements come from the list's factory: [`BuilderList::add_with`] produces
//! a fresh builder, hands it to a configuration closure, and appends it -
//! returning the list so configurations chain. Lists of `Default` builders
//! get the default constructor as their factory for free.
//!
//! ## Example
//!
//! ```rust
//! use buildweave::builder::{Buildable, BuilderCore};
//! use buildweave::builder_list::BuilderList;
//! use buildweave::failure::{Failure, FailuresDictionary};
//! use buildweave::visited::VisitedSet;
//!
//! #[derive(Default)]
//! struct PortBuilder {
//!   core: BuilderCore<u16>,
//!   port: Option<u16>,
//! }
//!
//! impl Buildable for PortBuilder {
//!   type Output = u16;
//!
//!   fn core(&self) -> &BuilderCore<u16> {
//!     &self.core
//!   }
//!
//!   fn instantiate(&self) -> Result<u16, Failure> {
//!     Ok(self.port.unwrap_or_default())
//!   }
//!
//!   fn validate_fields(&self, _visited: &mut VisitedSet, failures: &mut FailuresDictionary) {
//!     if self.port.is_none() {
//!       failures.add_failure("port", Failure::from_message("port is required"));
//!     }
//!   }
//! }
//!
//! let mut ports = BuilderList::<PortBuilder>::new();
//! ports
//!   .add_with(|b| b.port = Some(8080))
//!   .add_with(|b| b.port = Some(9090));
//!
//! let values = ports.build_success();
//! assert_eq!(values.iter().map(|v| **v).collect::<Vec<_>>(), vec![8080, 9090]);
//! ```

use crate::builder::{BuildResult, Buildable, Builder};
use crate::failure::FailuresDictionary;
use crate::reference::Reference;
use crate::visited::VisitedSet;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

type Factory<B> = Box<dyn Fn() -> B + Send + Sync>;

/// Ordered collection of child builders of one concrete type.
pub struct BuilderList<B: Buildable> {
  items: Vec<Arc<B>>,
  factory: Factory<B>,
}

impl<B: Buildable + Default + 'static> BuilderList<B> {
  /// Creates an empty list whose factory is `B::default`.
  pub fn new() -> Self {
    Self::with_factory(B::default)
  }
}

impl<B: Buildable + Default + 'static> Default for BuilderList<B> {
  fn default() -> Self {
    Self::new()
  }
}

impl<B: Buildable> BuilderList<B> {
  /// Creates an empty list producing new elements through `factory`.
  pub fn with_factory(factory: impl Fn() -> B + Send + Sync + 'static) -> Self {
    BuilderList {
      items: Vec::new(),
      factory: Box::new(factory),
    }
  }

  /// Produces a fresh element, applies `configure`, and appends it.
  ///
  /// Returns the list for chaining further configurations.
  pub fn add_with(&mut self, configure: impl FnOnce(&mut B)) -> &mut Self {
    let mut item = (self.factory)();
    configure(&mut item);
    self.items.push(Arc::new(item));
    self
  }

  /// Appends an already-configured builder.
  pub fn push(&mut self, builder: B) -> &mut Self {
    self.items.push(Arc::new(builder));
    self
  }

  /// Builds every element and returns the successfully produced values.
  ///
  /// Each element gets its own top-level traversal. Failed elements are
  /// silently skipped here; inspect them via
  /// [`validate_failures`](Self::validate_failures). Order follows the
  /// list.
  pub fn build_success(&self) -> Vec<Arc<B::Output>> {
    self
      .items
      .iter()
      .filter_map(|builder| match builder.build() {
        BuildResult::Success(built) => built.value().ok(),
        BuildResult::Failure(_) => {
          trace!(builder = %builder.id(), "element failed to build, skipped");
          None
        }
      })
      .collect()
  }

  /// Validates every element and returns the dictionaries of those that
  /// failed, in list order.
  ///
  /// Each element gets a fresh visited set and collector, so one element's
  /// traversal never short-circuits another's.
  pub fn validate_failures(&self) -> Vec<FailuresDictionary> {
    self
      .items
      .iter()
      .filter_map(|builder| {
        let mut visited = VisitedSet::new();
        let mut failures = FailuresDictionary::new();
        builder.validate(&mut visited, &mut failures);
        failures.has_failures().then_some(failures)
      })
      .collect()
  }

  /// The forward reference of every element, in list order, whether or not
  /// the elements have been built.
  pub fn as_reference_list(&self) -> Vec<Reference<B::Output>> {
    self.items.iter().map(|builder| builder.reference()).collect()
  }

  /// Iterates the elements in insertion order.
  pub fn iter(&self) -> impl Iterator<Item = &Arc<B>> {
    self.items.iter()
  }

  /// The element at `index`, if present.
  pub fn get(&self, index: usize) -> Option<&Arc<B>> {
    self.items.get(index)
  }

  /// Number of elements.
  pub fn len(&self) -> usize {
    self.items.len()
  }

  /// Returns `true` if the list has no elements.
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

impl<B: Buildable> fmt::Debug for BuilderList<B> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BuilderList")
      .field("len", &self.items.len())
      .finish()
  }
}
