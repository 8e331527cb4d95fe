//! # Traversal-Scoped Cycle Detection
//!
//! A [`VisitedSet`] records which builders a single build or validation
//! traversal has already entered, keyed by [`BuilderId`]. When a traversal
//! reaches a builder whose id is already present, it short-circuits instead
//! of recursing forever - that is the entire cycle-breaking mechanism.
//!
//! The set is always an explicit parameter threaded through the traversal,
//! never a global or a thread-local: independent concurrent top-level
//! traversals each create their own set and must not see each other's
//! entries. The outermost caller creates the set (or lets
//! [`Builder::build`](crate::builder::Builder::build) create one) and it is
//! discarded when that call returns. Passing an existing set into
//! [`build_with`](crate::builder::Builder::build_with) joins the caller's
//! traversal, which is how cross-builder cycles are broken.

use crate::identity::BuilderId;
use std::collections::HashSet;

/// The set of builder ids entered by one build or validation traversal.
#[derive(Debug, Default)]
pub struct VisitedSet {
  seen: HashSet<BuilderId>,
}

impl VisitedSet {
  /// Creates an empty set for a new top-level traversal.
  pub fn new() -> Self {
    VisitedSet {
      seen: HashSet::new(),
    }
  }

  /// Records `id` as visited. Returns `false` if it was already present.
  pub fn insert(&mut self, id: BuilderId) -> bool {
    self.seen.insert(id)
  }

  /// Returns `true` if `id` has been visited in this traversal.
  pub fn contains(&self, id: BuilderId) -> bool {
    self.seen.contains(&id)
  }

  /// Number of builders entered so far.
  pub fn len(&self) -> usize {
    self.seen.len()
  }

  /// Returns `true` if no builder has been entered yet.
  pub fn is_empty(&self) -> bool {
    self.seen.is_empty()
  }
}
