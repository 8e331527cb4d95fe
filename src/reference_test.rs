//! Unit tests for [`Reference`]: resolution lifecycle, first-resolution-wins,
//! and callback ordering semantics.

use crate::reference::{Reference, ResolveError};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[test]
fn unresolved_reference_reports_not_resolved() {
  let reference: Reference<String> = Reference::new();

  assert!(!reference.is_resolved());
  assert_eq!(reference.resolved().unwrap_err(), ResolveError::Unresolved);
  assert!(reference.resolved_or_none().is_none());
}

#[test]
fn resolve_makes_value_visible_through_both_accessors() {
  let reference: Reference<String> = Reference::new();
  let value = Arc::new("ready".to_string());

  reference.resolve(Arc::clone(&value));

  assert!(reference.is_resolved());
  assert!(Arc::ptr_eq(&reference.resolved().unwrap(), &value));
  assert!(Arc::ptr_eq(&reference.resolved_or_none().unwrap(), &value));
}

#[test]
fn first_resolution_wins() {
  let reference: Reference<i32> = Reference::new();
  let first = Arc::new(1);
  let second = Arc::new(2);

  reference.resolve(Arc::clone(&first));
  reference.resolve(second);

  assert!(Arc::ptr_eq(&reference.resolved().unwrap(), &first));
}

#[test]
fn resolved_to_starts_resolved() {
  let value = Arc::new(42);
  let reference = Reference::resolved_to(Arc::clone(&value));

  assert!(reference.is_resolved());
  assert!(Arc::ptr_eq(&reference.resolved().unwrap(), &value));
}

#[test]
fn clones_share_the_same_slot() {
  let reference: Reference<i32> = Reference::new();
  let clone = reference.clone();

  reference.resolve(Arc::new(7));

  assert_eq!(*clone.resolved().unwrap(), 7);
}

#[test]
fn callbacks_fire_once_in_registration_order() {
  let reference: Reference<i32> = Reference::new();
  let order = Arc::new(Mutex::new(Vec::new()));

  for tag in ["first", "second", "third"] {
    let order = Arc::clone(&order);
    reference.on_resolve(move |value| order.lock().unwrap().push((tag, **value)));
  }

  reference.resolve(Arc::new(9));

  assert_eq!(
    *order.lock().unwrap(),
    vec![("first", 9), ("second", 9), ("third", 9)]
  );
}

#[test]
fn callbacks_do_not_fire_again_on_repeated_resolution() {
  let reference: Reference<i32> = Reference::new();
  let calls = Arc::new(AtomicUsize::new(0));

  let counter = Arc::clone(&calls);
  reference.on_resolve(move |_| {
    counter.fetch_add(1, Ordering::SeqCst);
  });

  reference.resolve(Arc::new(1));
  reference.resolve(Arc::new(2));

  assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn late_callback_is_dropped_not_invoked() {
  let reference: Reference<i32> = Reference::new();
  reference.resolve(Arc::new(5));

  let calls = Arc::new(AtomicUsize::new(0));
  let counter = Arc::clone(&calls);
  reference.on_resolve(move |_| {
    counter.fetch_add(1, Ordering::SeqCst);
  });

  assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn callback_may_read_the_reference_it_watches() {
  let reference: Reference<i32> = Reference::new();
  let observed = Arc::new(Mutex::new(None));

  let clone = reference.clone();
  let slot = Arc::clone(&observed);
  reference.on_resolve(move |_| {
    *slot.lock().unwrap() = clone.resolved_or_none().map(|v| *v);
  });

  reference.resolve(Arc::new(11));

  assert_eq!(*observed.lock().unwrap(), Some(11));
}
