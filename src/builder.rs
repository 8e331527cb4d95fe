//! # Builder Orchestration
//!
//! This module is the core of the crate: it turns three caller-supplied
//! domain hooks into a full deferred-construction contract - cycle-tolerant
//! traversal, per-field failure aggregation, and a build-once/validate-once
//! guarantee that holds under concurrent invocation.
//!
//! ## The split
//!
//! - **[`Buildable`]** is what a concrete domain builder implements: access
//!   to its [`BuilderCore`] plus the hooks `instantiate`, `validate_fields`
//!   and `build_children`. The hooks contain all the domain knowledge and no
//!   orchestration.
//! - **[`Builder`]** is the public contract, blanket-implemented for every
//!   `Buildable`: `build`, `validate`, `reference`, `existing`, `result`,
//!   `on_built`, and status inspection. Domain builders never override it.
//!
//! ## Build flow
//!
//! `build` walks the graph depth-first: cycle check against the visited set,
//! double-checked memoization around the strategy's write section, the
//! existing-instance short-circuit, validation (its own traversal scope,
//! aggregating per-field failures), then children, then `instantiate`, and
//! finally resolution of the builder's [`Reference`] - which is the moment
//! forward references held by other builders come alive.
//!
//! ## Example
//!
//! ```rust
//! use buildweave::builder::{Buildable, Builder, BuilderCore};
//! use buildweave::failure::{Failure, FailuresDictionary};
//! use buildweave::visited::VisitedSet;
//!
//! struct LabelBuilder {
//!   core: BuilderCore<String>,
//!   text: Option<String>,
//! }
//!
//! impl Buildable for LabelBuilder {
//!   type Output = String;
//!
//!   fn core(&self) -> &BuilderCore<String> {
//!     &self.core
//!   }
//!
//!   fn instantiate(&self) -> Result<String, Failure> {
//!     Ok(self.text.clone().unwrap_or_default())
//!   }
//!
//!   fn validate_fields(&self, _visited: &mut VisitedSet, failures: &mut FailuresDictionary) {
//!     if self.text.is_none() {
//!       failures.add_failure("text", Failure::from_message("text is required"));
//!     }
//!   }
//! }
//!
//! let builder = LabelBuilder { core: BuilderCore::new(), text: Some("hello".into()) };
//! let result = builder.build();
//! assert_eq!(*result.success().unwrap().value().unwrap(), "hello");
//! ```

use crate::failure::{AggregateError, Failure, FailuresDictionary};
use crate::identity::{BuildStatus, BuilderId, ValidationStatus};
use crate::reference::{Reference, ResolveError};
use crate::sync_strategy::{ExclusiveStrategy, SyncStrategy};
use crate::visited::VisitedSet;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Field name under which an error returned by
/// [`Buildable::instantiate`] is recorded in the failure dictionary.
pub const INSTANTIATE_FIELD: &str = "instantiate";

/// Error returned when a builder's cached outcome is read too early.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultError {
  /// `result()` was called before any `build()` call completed or failed.
  #[error("result accessed before build() was called")]
  NotBuilt,
}

type BuiltCallback<T> = Box<dyn FnOnce(&Arc<T>) + Send>;

struct CoreState<T> {
  build_status: BuildStatus,
  validation_status: ValidationStatus,
  existing: Option<Arc<T>>,
  result: Option<BuildResult<T>>,
  on_built: Vec<BuiltCallback<T>>,
}

/// Shared orchestration state embedded in every concrete builder.
///
/// Holds the builder's identity, both status machines, the owned
/// [`Reference`], the optional existing-instance override, the cached build
/// outcome, and the synchronization strategy. Domain builders embed one and
/// return it from [`Buildable::core`]; all mutation goes through the
/// [`Builder`] contract.
pub struct BuilderCore<T> {
  id: BuilderId,
  strategy: Arc<dyn SyncStrategy>,
  reference: Reference<T>,
  state: Mutex<CoreState<T>>,
}

impl<T> BuilderCore<T> {
  /// Creates a core with its own [`ExclusiveStrategy`].
  pub fn new() -> Self {
    Self::with_strategy(Arc::new(ExclusiveStrategy::new()))
  }

  /// Creates a core using `strategy` for its critical sections.
  ///
  /// Several builders may share one strategy instance; their build and
  /// validate sections then serialize against each other.
  pub fn with_strategy(strategy: Arc<dyn SyncStrategy>) -> Self {
    BuilderCore {
      id: BuilderId::next(),
      strategy,
      reference: Reference::new(),
      state: Mutex::new(CoreState {
        build_status: BuildStatus::NotBuilding,
        validation_status: ValidationStatus::NotValidated,
        existing: None,
        result: None,
        on_built: Vec::new(),
      }),
    }
  }

  /// This builder's identity.
  pub fn id(&self) -> BuilderId {
    self.id
  }

  /// A clone of the builder's forward reference.
  pub fn reference(&self) -> Reference<T> {
    self.reference.clone()
  }

  /// Current build status.
  ///
  /// A read-style access: it enters the strategy's read section, so under
  /// [`crate::sync_strategy::ReadWriteStrategy`] any number of inspections
  /// proceed together.
  pub fn build_status(&self) -> BuildStatus {
    let _section = self.strategy.read_section();
    self.state.lock().build_status
  }

  /// Current validation status.
  pub fn validation_status(&self) -> ValidationStatus {
    let _section = self.strategy.read_section();
    self.state.lock().validation_status
  }

  fn cached_if_built(&self) -> Option<BuildResult<T>> {
    let state = self.state.lock();
    if state.build_status == BuildStatus::Built {
      state.result.clone()
    } else {
      None
    }
  }

  fn set_existing(&self, value: Arc<T>) {
    self.state.lock().existing = Some(value);
  }

  fn existing(&self) -> Option<Arc<T>> {
    self.state.lock().existing.clone()
  }

  fn set_build_status(&self, status: BuildStatus) {
    self.state.lock().build_status = status;
  }

  fn set_validation_status(&self, status: ValidationStatus) {
    self.state.lock().validation_status = status;
  }

  fn cache_failure(&self, result: BuildResult<T>) {
    // Build status deliberately stays at Building; see Builder::build.
    self.state.lock().result = Some(result);
  }

  fn complete(&self, result: BuildResult<T>) -> Vec<BuiltCallback<T>> {
    let mut state = self.state.lock();
    state.build_status = BuildStatus::Built;
    state.result = Some(result);
    std::mem::take(&mut state.on_built)
  }

  fn push_on_built(&self, callback: BuiltCallback<T>) {
    let mut state = self.state.lock();
    if state.build_status == BuildStatus::Built {
      // Mirrors Reference::on_resolve: late registration is dropped.
      return;
    }
    state.on_built.push(callback);
  }

  fn cached_result(&self) -> Result<BuildResult<T>, ResultError> {
    let _section = self.strategy.read_section();
    self.state.lock().result.clone().ok_or(ResultError::NotBuilt)
  }
}

impl<T> Default for BuilderCore<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> fmt::Debug for BuilderCore<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.lock();
    f.debug_struct("BuilderCore")
      .field("id", &self.id)
      .field("build_status", &state.build_status)
      .field("validation_status", &state.validation_status)
      .field("resolved", &self.reference.is_resolved())
      .finish()
  }
}

/// A successfully built value, reachable through the builder's reference.
///
/// The reference may still be unresolved when this is returned as a cycle
/// break - the builder it points at is higher up the current traversal and
/// resolves on its way out.
pub struct Built<T> {
  reference: Reference<T>,
}

impl<T> Built<T> {
  /// The builder's forward reference.
  pub fn reference(&self) -> &Reference<T> {
    &self.reference
  }

  /// The built value.
  ///
  /// # Errors
  ///
  /// Returns [`ResolveError::Unresolved`] while the reference is still a
  /// forward handle into an unfinished cycle.
  pub fn value(&self) -> Result<Arc<T>, ResolveError> {
    self.reference.resolved()
  }
}

impl<T> Clone for Built<T> {
  fn clone(&self) -> Self {
    Built {
      reference: self.reference.clone(),
    }
  }
}

impl<T> fmt::Debug for Built<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Built")
      .field("reference", &self.reference)
      .finish()
  }
}

/// Outcome of a [`Builder::build`] call.
pub enum BuildResult<T> {
  /// The value was produced (or will resolve when an enclosing cycle
  /// finishes); carries the builder's reference.
  Success(Built<T>),
  /// Validation or instantiation recorded failures.
  Failure(FailuresDictionary),
}

impl<T> BuildResult<T> {
  /// Returns `true` for the success variant.
  pub fn is_success(&self) -> bool {
    matches!(self, BuildResult::Success(_))
  }

  /// The success payload, if any.
  pub fn success(&self) -> Option<&Built<T>> {
    match self {
      BuildResult::Success(built) => Some(built),
      BuildResult::Failure(_) => None,
    }
  }

  /// The failure dictionary, if any.
  pub fn failures(&self) -> Option<&FailuresDictionary> {
    match self {
      BuildResult::Success(_) => None,
      BuildResult::Failure(failures) => Some(failures),
    }
  }

  /// Converts a failure outcome into one aggregated hard error.
  ///
  /// # Errors
  ///
  /// Returns an [`AggregateError`] listing every recorded failure
  /// depth-first when this is the failure variant.
  pub fn into_error(self) -> Result<Built<T>, AggregateError> {
    match self {
      BuildResult::Success(built) => Ok(built),
      BuildResult::Failure(failures) => Err(AggregateError::new(failures)),
    }
  }
}

impl<T> Clone for BuildResult<T> {
  fn clone(&self) -> Self {
    match self {
      BuildResult::Success(built) => BuildResult::Success(built.clone()),
      BuildResult::Failure(failures) => BuildResult::Failure(failures.clone()),
    }
  }
}

impl<T> fmt::Debug for BuildResult<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildResult::Success(built) => f.debug_tuple("Success").field(built).finish(),
      BuildResult::Failure(failures) => f.debug_tuple("Failure").field(failures).finish(),
    }
  }
}

/// The three domain hooks a concrete builder supplies to the engine.
///
/// Implementations hold their configuration fields and an embedded
/// [`BuilderCore`]; the engine guarantees each hook runs at most once per
/// builder, no matter how many threads call [`Builder::build`] or
/// [`Builder::validate`].
pub trait Buildable {
  /// The type this builder produces.
  type Output: Send + Sync + 'static;

  /// The embedded orchestration core.
  fn core(&self) -> &BuilderCore<Self::Output>;

  /// Produces the value from the currently-set fields and any
  /// already-resolved child references.
  ///
  /// Runs only after validation passed and children were built.
  ///
  /// # Errors
  ///
  /// A returned [`Failure`] surfaces in the build result under the
  /// [`INSTANTIATE_FIELD`] field.
  fn instantiate(&self) -> Result<Self::Output, Failure>;

  /// Inspects fields and records failures; recursively validates owned
  /// child builders (each child's dictionary is merged under this
  /// builder's field name via
  /// [`FailuresDictionary::merge_nested`]).
  fn validate_fields(&self, visited: &mut VisitedSet, failures: &mut FailuresDictionary);

  /// Builds owned child builders before [`instantiate`](Self::instantiate)
  /// runs, sharing the current traversal's visited set. Per-child results
  /// are discarded; their failures already surfaced during validation.
  fn build_children(&self, visited: &mut VisitedSet) {
    let _ = visited;
  }
}

/// The public builder contract, blanket-implemented for every [`Buildable`].
pub trait Builder: Buildable {
  /// Builds this builder as a fresh top-level traversal.
  ///
  /// Idempotent: every call - sequential or concurrent - returns a result
  /// holding the identical underlying value, and the
  /// [`instantiate`](Buildable::instantiate) hook runs at most once.
  ///
  /// A failed validation leaves the build status at
  /// [`BuildStatus::Building`] rather than resetting it; a later `build`
  /// call will then skip the (memoized) validation pass and proceed to
  /// instantiate. Long-standing behavior, kept as is.
  fn build(&self) -> BuildResult<Self::Output> {
    let mut visited = VisitedSet::new();
    self.build_with(&mut visited)
  }

  /// Builds within an existing traversal.
  ///
  /// If this builder is already in `visited` the call is a cycle break: it
  /// returns success carrying the builder's own - possibly still
  /// unresolved - reference, and the builder higher up the traversal
  /// resolves it on the way out.
  fn build_with(&self, visited: &mut VisitedSet) -> BuildResult<Self::Output> {
    let core = self.core();
    if !visited.insert(core.id) {
      trace!(builder = %core.id, "cycle detected, returning forward reference");
      return BuildResult::Success(Built {
        reference: core.reference(),
      });
    }

    // Memoization fast path, re-checked under the section below.
    if let Some(result) = core.cached_if_built() {
      trace!(builder = %core.id, "build memoized");
      return result;
    }

    let _section = core.strategy.write_section();

    if let Some(result) = core.cached_if_built() {
      trace!(builder = %core.id, "build memoized");
      return result;
    }

    if let Some(value) = core.existing() {
      debug!(builder = %core.id, "using existing instance");
      core.reference.resolve(Arc::clone(&value));
      let result = BuildResult::Success(Built {
        reference: core.reference(),
      });
      let callbacks = core.complete(result.clone());
      for callback in callbacks {
        callback(&value);
      }
      return result;
    }

    core.set_build_status(BuildStatus::Building);

    // Validation runs in its own traversal scope: build and validation
    // cycle detection are independent passes.
    let mut validation_visited = VisitedSet::new();
    let mut failures = FailuresDictionary::new();
    self.validate(&mut validation_visited, &mut failures);
    if failures.has_failures() {
      debug!(
        builder = %core.id,
        count = failures.failure_count(),
        "build failed validation"
      );
      let result = BuildResult::Failure(failures);
      core.cache_failure(result.clone());
      return result;
    }

    self.build_children(visited);

    let value = match self.instantiate() {
      Ok(value) => Arc::new(value),
      Err(failure) => {
        debug!(builder = %core.id, %failure, "instantiate failed");
        let mut failures = FailuresDictionary::new();
        failures.add_failure(INSTANTIATE_FIELD, failure);
        let result = BuildResult::Failure(failures);
        core.cache_failure(result.clone());
        return result;
      }
    };

    debug!(builder = %core.id, "built");
    core.reference.resolve(Arc::clone(&value));
    let result = BuildResult::Success(Built {
      reference: core.reference(),
    });
    let callbacks = core.complete(result.clone());
    for callback in callbacks {
      callback(&value);
    }
    result
  }

  /// Validates within an existing traversal, recording failures into the
  /// caller's collector.
  ///
  /// Idempotent per builder: once the status is
  /// [`ValidationStatus::Validated`] further calls are no-ops, and the
  /// [`validate_fields`](Buildable::validate_fields) hook runs at most once
  /// even under concurrent calls. A builder already in `visited` is skipped
  /// - the field it backs is intentionally left unchecked rather than
  /// recursing forever.
  fn validate(&self, visited: &mut VisitedSet, failures: &mut FailuresDictionary) {
    let core = self.core();
    if !visited.insert(core.id) {
      trace!(builder = %core.id, "cycle detected during validation");
      return;
    }

    if core.validation_status() == ValidationStatus::Validated {
      return;
    }

    let _section = core.strategy.write_section();

    if core.validation_status() == ValidationStatus::Validated {
      trace!(builder = %core.id, "validation memoized");
      return;
    }

    core.set_validation_status(ValidationStatus::Validating);
    self.validate_fields(visited, failures);
    // Validated is terminal whether or not failures were recorded.
    core.set_validation_status(ValidationStatus::Validated);
  }

  /// Installs an existing instance, bypassing validation and instantiation.
  ///
  /// Every subsequent `build` succeeds with exactly this value.
  fn existing(&self, value: Arc<Self::Output>) {
    self.core().set_existing(value);
  }

  /// The builder's forward reference, usable before building completes.
  fn reference(&self) -> Reference<Self::Output> {
    self.core().reference()
  }

  /// The cached outcome of the last `build` call.
  ///
  /// # Errors
  ///
  /// Returns [`ResultError::NotBuilt`] if no `build` call has completed or
  /// failed yet.
  fn result(&self) -> Result<BuildResult<Self::Output>, ResultError> {
    self.core().cached_result()
  }

  /// Registers a hook to run with the built value after instantiation.
  ///
  /// Distinct from the reference's own callback list. Like
  /// [`Reference::on_resolve`], registration after the builder is built is
  /// dropped.
  fn on_built(&self, callback: impl FnOnce(&Arc<Self::Output>) + Send + 'static)
  where
    Self: Sized,
  {
    self.core().push_on_built(Box::new(callback));
  }

  /// Current build status.
  fn build_status(&self) -> BuildStatus {
    self.core().build_status()
  }

  /// Current validation status.
  fn validation_status(&self) -> ValidationStatus {
    self.core().validation_status()
  }

  /// This builder's identity.
  fn id(&self) -> BuilderId {
    self.core().id()
  }
}

impl<B: Buildable + ?Sized> Builder for B {}
