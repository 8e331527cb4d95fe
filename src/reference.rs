//! # Forward References
//!
//! A [`Reference`] is a write-once box around a value that may not exist yet.
//! It is the mechanism that lets builders point at each other in cycles: each
//! builder hands out clones of its reference before building, and resolves it
//! exactly once when its value is finally produced.
//!
//! ## Resolution semantics
//!
//! - First resolution wins. A second `resolve` call, even with a different
//!   instance, is a silent no-op.
//! - Callbacks registered **before** resolution fire exactly once,
//!   synchronously, in registration order, at resolution time.
//! - Callbacks registered **after** resolution are dropped without being
//!   invoked. This differs from the common "fire immediately" convention and
//!   regularly surprises callers; see [`Reference::on_resolve`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use buildweave::reference::Reference;
//!
//! let reference: Reference<String> = Reference::new();
//! assert!(reference.resolved().is_err());
//! assert!(reference.resolved_or_none().is_none());
//!
//! reference.resolve(Arc::new("ready".to_string()));
//! assert_eq!(*reference.resolved().unwrap(), "ready");
//! ```

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error returned when a reference is read before it has been resolved.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
  /// The reference has not been resolved yet.
  #[error("reference has not been resolved")]
  Unresolved,
}

type ResolveCallback<T> = Box<dyn FnOnce(&Arc<T>) + Send>;

struct ReferenceState<T> {
  value: Option<Arc<T>>,
  callbacks: Vec<ResolveCallback<T>>,
}

/// A forward handle to a value of type `T` that may not exist yet.
///
/// Clones share the same underlying slot: resolving any clone resolves them
/// all. Builders create one reference at construction time and hand out
/// clones via [`Builder::reference`](crate::builder::Builder::reference), so a
/// consumer can hold the handle long before the value exists.
pub struct Reference<T> {
  state: Arc<Mutex<ReferenceState<T>>>,
}

impl<T> Reference<T> {
  /// Creates an unresolved reference.
  pub fn new() -> Self {
    Reference {
      state: Arc::new(Mutex::new(ReferenceState {
        value: None,
        callbacks: Vec::new(),
      })),
    }
  }

  /// Creates a reference that is already resolved to `value`.
  ///
  /// Used when wrapping an existing instance that never goes through the
  /// build pipeline.
  pub fn resolved_to(value: Arc<T>) -> Self {
    Reference {
      state: Arc::new(Mutex::new(ReferenceState {
        value: Some(value),
        callbacks: Vec::new(),
      })),
    }
  }

  /// Resolves the reference to `value`.
  ///
  /// The first resolution stores the value and synchronously invokes every
  /// pending callback, in registration order. If the reference is already
  /// resolved this is a no-op; the held instance never changes.
  pub fn resolve(&self, value: Arc<T>) {
    let callbacks = {
      let mut state = self.state.lock();
      if state.value.is_some() {
        return;
      }
      state.value = Some(Arc::clone(&value));
      std::mem::take(&mut state.callbacks)
    };
    // Callbacks run outside the lock so they may freely read the reference.
    for callback in callbacks {
      callback(&value);
    }
  }

  /// Returns the resolved value.
  ///
  /// # Errors
  ///
  /// Returns [`ResolveError::Unresolved`] if called before resolution.
  pub fn resolved(&self) -> Result<Arc<T>, ResolveError> {
    self
      .state
      .lock()
      .value
      .clone()
      .ok_or(ResolveError::Unresolved)
  }

  /// Returns the resolved value, or `None` if not yet resolved. Never fails.
  pub fn resolved_or_none(&self) -> Option<Arc<T>> {
    self.state.lock().value.clone()
  }

  /// Returns `true` once the reference has been resolved.
  pub fn is_resolved(&self) -> bool {
    self.state.lock().value.is_some()
  }

  /// Registers a callback to run when the reference resolves.
  ///
  /// If the reference is **already** resolved the callback is dropped without
  /// being invoked - it does not fire immediately with the known value. Check
  /// [`is_resolved`](Self::is_resolved) first when late registration is
  /// possible.
  pub fn on_resolve(&self, callback: impl FnOnce(&Arc<T>) + Send + 'static) {
    let mut state = self.state.lock();
    if state.value.is_some() {
      return;
    }
    state.callbacks.push(Box::new(callback));
  }
}

impl<T> Clone for Reference<T> {
  fn clone(&self) -> Self {
    Reference {
      state: Arc::clone(&self.state),
    }
  }
}

impl<T> Default for Reference<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> fmt::Debug for Reference<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.lock();
    f.debug_struct("Reference")
      .field("resolved", &state.value.is_some())
      .field("pending_callbacks", &state.callbacks.len())
      .finish()
  }
}
