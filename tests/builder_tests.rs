//! Integration tests for the builder orchestration contract: memoization,
//! existing-instance overrides, failure aggregation across nested builders,
//! and cycle handling through forward references.

use buildweave::builder::{Buildable, Builder, BuilderCore, ResultError};
use buildweave::failure::{Failure, FailuresDictionary};
use buildweave::identity::{BuildStatus, ValidationStatus};
use buildweave::reference::Reference;
use buildweave::visited::VisitedSet;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

// ============================================================================
// Fixtures
// ============================================================================

/// Minimal builder that counts how often its hooks run.
#[derive(Default)]
struct CounterBuilder {
  core: BuilderCore<usize>,
  value: usize,
  fail_validation: bool,
  fail_instantiate: bool,
  instantiate_calls: Arc<AtomicUsize>,
  validate_calls: Arc<AtomicUsize>,
}

impl Buildable for CounterBuilder {
  type Output = usize;

  fn core(&self) -> &BuilderCore<usize> {
    &self.core
  }

  fn instantiate(&self) -> Result<usize, Failure> {
    self.instantiate_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_instantiate {
      return Err(Failure::from_message("instantiation refused"));
    }
    Ok(self.value)
  }

  fn validate_fields(&self, _visited: &mut VisitedSet, failures: &mut FailuresDictionary) {
    self.validate_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_validation {
      failures.add_failure("value", Failure::from_message("value rejected"));
    }
  }
}

#[derive(Debug)]
struct Address {
  street: String,
}

#[derive(Default)]
struct AddressBuilder {
  core: BuilderCore<Address>,
  street: Option<String>,
}

impl Buildable for AddressBuilder {
  type Output = Address;

  fn core(&self) -> &BuilderCore<Address> {
    &self.core
  }

  fn instantiate(&self) -> Result<Address, Failure> {
    Ok(Address {
      street: self.street.clone().unwrap_or_default(),
    })
  }

  fn validate_fields(&self, _visited: &mut VisitedSet, failures: &mut FailuresDictionary) {
    if self.street.as_deref().is_none_or(|s| s.trim().is_empty()) {
      failures.add_failure("street", Failure::from_message("street must not be blank"));
    }
  }
}

#[derive(Debug)]
struct Person {
  name: String,
  age: i64,
  address: Option<Arc<Address>>,
}

#[derive(Default)]
struct PersonBuilder {
  core: BuilderCore<Person>,
  name: Option<String>,
  age: Option<i64>,
  address: Option<Arc<AddressBuilder>>,
}

impl PersonBuilder {
  fn name(mut self, name: &str) -> Self {
    self.name = Some(name.to_string());
    self
  }

  fn age(mut self, age: i64) -> Self {
    self.age = Some(age);
    self
  }

  fn address(mut self, address: AddressBuilder) -> Self {
    self.address = Some(Arc::new(address));
    self
  }
}

impl Buildable for PersonBuilder {
  type Output = Person;

  fn core(&self) -> &BuilderCore<Person> {
    &self.core
  }

  fn instantiate(&self) -> Result<Person, Failure> {
    Ok(Person {
      name: self.name.clone().unwrap_or_default(),
      age: self.age.unwrap_or_default(),
      address: self
        .address
        .as_ref()
        .and_then(|a| a.reference().resolved_or_none()),
    })
  }

  fn validate_fields(&self, visited: &mut VisitedSet, failures: &mut FailuresDictionary) {
    if self.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
      failures.add_failure("name", Failure::from_message("name must not be blank"));
    }
    if self.age.is_some_and(|a| a < 0) {
      failures.add_failure("age", Failure::from_message("age must be non-negative"));
    }
    if let Some(address) = &self.address {
      let mut child = FailuresDictionary::new();
      address.validate(visited, &mut child);
      failures.merge_nested("address", child);
    }
  }

  fn build_children(&self, visited: &mut VisitedSet) {
    if let Some(address) = &self.address {
      let _ = address.build_with(visited);
    }
  }
}

/// A node in a mutually-referencing pair. The partner edge is weak so the
/// test graph has no strong reference cycle; the value keeps only the
/// partner's forward reference.
#[derive(Debug)]
struct Node {
  label: String,
  partner: Reference<Node>,
}

struct NodeBuilder {
  core: BuilderCore<Node>,
  label: String,
  partner: Mutex<Option<Weak<NodeBuilder>>>,
  partner_unresolved_at_instantiate: AtomicBool,
}

impl NodeBuilder {
  fn new(label: &str) -> Arc<Self> {
    Arc::new(NodeBuilder {
      core: BuilderCore::new(),
      label: label.to_string(),
      partner: Mutex::new(None),
      partner_unresolved_at_instantiate: AtomicBool::new(false),
    })
  }

  fn set_partner(&self, partner: &Arc<NodeBuilder>) {
    *self.partner.lock() = Some(Arc::downgrade(partner));
  }

  fn partner_builder(&self) -> Option<Arc<NodeBuilder>> {
    self.partner.lock().as_ref().and_then(Weak::upgrade)
  }
}

impl Buildable for NodeBuilder {
  type Output = Node;

  fn core(&self) -> &BuilderCore<Node> {
    &self.core
  }

  fn instantiate(&self) -> Result<Node, Failure> {
    let reference = match self.partner_builder() {
      Some(partner) => partner.reference(),
      None => Reference::new(),
    };
    self
      .partner_unresolved_at_instantiate
      .store(!reference.is_resolved(), Ordering::SeqCst);
    Ok(Node {
      label: self.label.clone(),
      partner: reference,
    })
  }

  fn validate_fields(&self, visited: &mut VisitedSet, failures: &mut FailuresDictionary) {
    if let Some(partner) = self.partner_builder() {
      let mut child = FailuresDictionary::new();
      partner.validate(visited, &mut child);
      failures.merge_nested("partner", child);
    }
  }

  fn build_children(&self, visited: &mut VisitedSet) {
    if let Some(partner) = self.partner_builder() {
      let _ = partner.build_with(visited);
    }
  }
}

// ============================================================================
// Memoization and status
// ============================================================================

#[test]
fn build_twice_returns_the_identical_instance() {
  let builder = CounterBuilder {
    value: 42,
    ..CounterBuilder::default()
  };

  let first = builder.build();
  let second = builder.build();

  let first_value = first.success().unwrap().value().unwrap();
  let second_value = second.success().unwrap().value().unwrap();
  assert!(Arc::ptr_eq(&first_value, &second_value));
  assert_eq!(*first_value, 42);
  assert_eq!(builder.instantiate_calls.load(Ordering::SeqCst), 1);
  assert_eq!(builder.build_status(), BuildStatus::Built);
}

#[test]
fn validate_twice_runs_the_hook_once() {
  let builder = CounterBuilder::default();

  for _ in 0..2 {
    let mut visited = VisitedSet::new();
    let mut failures = FailuresDictionary::new();
    builder.validate(&mut visited, &mut failures);
    assert_eq!(builder.validation_status(), ValidationStatus::Validated);
  }

  assert_eq!(builder.validate_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn build_validates_at_most_once() {
  let builder = CounterBuilder::default();

  builder.build();
  builder.build();

  assert_eq!(builder.validate_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn result_before_build_is_a_state_failure() {
  let builder = CounterBuilder::default();
  assert_eq!(builder.result().unwrap_err(), ResultError::NotBuilt);
}

#[test]
fn result_after_build_returns_the_cached_outcome() {
  let builder = CounterBuilder {
    value: 7,
    ..CounterBuilder::default()
  };
  builder.build();

  let cached = builder.result().unwrap();
  assert_eq!(*cached.success().unwrap().value().unwrap(), 7);
}

#[test]
fn failed_validation_leaves_status_building() {
  let builder = CounterBuilder {
    fail_validation: true,
    ..CounterBuilder::default()
  };

  let result = builder.build();

  assert!(!result.is_success());
  assert_eq!(builder.build_status(), BuildStatus::Building);
  assert_eq!(builder.validation_status(), ValidationStatus::Validated);
  assert!(!builder.reference().is_resolved());
  assert_eq!(builder.instantiate_calls.load(Ordering::SeqCst), 0);

  // The failure is the cached outcome.
  let cached = builder.result().unwrap();
  assert!(cached.failures().unwrap().get("value").is_some());
}

#[test]
fn rebuild_after_failed_validation_skips_the_memoized_validation() {
  // Validation is memoized per builder, so a second build after a failed
  // one finds no new failures and proceeds to instantiate. Long-standing
  // behavior; asserted here so a change is a conscious one.
  let builder = CounterBuilder {
    value: 3,
    fail_validation: true,
    ..CounterBuilder::default()
  };

  assert!(!builder.build().is_success());
  let second = builder.build();

  assert!(second.is_success());
  assert_eq!(builder.validate_calls.load(Ordering::SeqCst), 1);
  assert_eq!(builder.instantiate_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn instantiate_error_surfaces_as_a_failure_result() {
  let builder = CounterBuilder {
    fail_instantiate: true,
    ..CounterBuilder::default()
  };

  let result = builder.build();

  let failures = result.failures().unwrap();
  assert_eq!(
    failures.get("instantiate").unwrap()[0].message(),
    Some("instantiation refused")
  );
  assert!(!builder.reference().is_resolved());
}

// ============================================================================
// Existing-instance override
// ============================================================================

#[test]
fn existing_instance_bypasses_validation_and_instantiate() {
  let builder = CounterBuilder {
    fail_validation: true,
    ..CounterBuilder::default()
  };
  let existing = Arc::new(99usize);
  builder.existing(Arc::clone(&existing));

  let result = builder.build();

  let value = result.success().unwrap().value().unwrap();
  assert!(Arc::ptr_eq(&value, &existing));
  assert_eq!(builder.instantiate_calls.load(Ordering::SeqCst), 0);
  assert_eq!(builder.validate_calls.load(Ordering::SeqCst), 0);
  assert_eq!(builder.build_status(), BuildStatus::Built);
  assert!(builder.reference().is_resolved());
}

#[test]
fn existing_instance_is_stable_across_repeated_builds() {
  let builder = CounterBuilder::default();
  let existing = Arc::new(5usize);
  builder.existing(Arc::clone(&existing));

  let first = builder.build();
  let second = builder.build();

  assert!(Arc::ptr_eq(
    &first.success().unwrap().value().unwrap(),
    &second.success().unwrap().value().unwrap()
  ));
}

// ============================================================================
// Failure aggregation
// ============================================================================

#[test]
fn person_with_blank_name_and_negative_age_fails_on_both_fields() {
  let builder = PersonBuilder::default().age(-5);

  let result = builder.build();

  let failures = result.failures().unwrap();
  assert!(failures.get("name").is_some());
  assert!(failures.get("age").is_some());
  assert_eq!(failures.failure_count(), 2);
}

#[test]
fn child_failures_nest_under_the_parent_field() {
  let builder = PersonBuilder::default()
    .name("Ada")
    .age(36)
    .address(AddressBuilder::default());

  let result = builder.build();

  let failures = result.failures().unwrap();
  let nested = failures.get("address").unwrap()[0].nested().unwrap();
  assert!(nested.get("street").is_some());
}

#[test]
fn valid_person_builds_with_its_child() {
  let builder = PersonBuilder::default().name("Ada").age(36).address(AddressBuilder {
    core: BuilderCore::new(),
    street: Some("12 Analytical Row".into()),
  });

  let result = builder.build();

  let person = result.success().unwrap().value().unwrap();
  assert_eq!(person.name, "Ada");
  assert_eq!(person.age, 36);
  assert_eq!(person.address.as_ref().unwrap().street, "12 Analytical Row");
}

#[test]
fn sibling_failures_are_aggregated_not_short_circuited() {
  let builder = PersonBuilder::default().age(-1).address(AddressBuilder::default());

  let result = builder.build();

  let failures = result.failures().unwrap();
  assert!(failures.get("name").is_some());
  assert!(failures.get("age").is_some());
  assert!(failures.get("address").is_some());
}

// ============================================================================
// Cycles
// ============================================================================

#[test]
fn mutual_cycle_terminates_and_resolves_both_references() {
  let a = NodeBuilder::new("a");
  let b = NodeBuilder::new("b");
  a.set_partner(&b);
  b.set_partner(&a);

  let result = a.build();

  assert!(result.is_success());
  let a_node = result.success().unwrap().value().unwrap();
  assert_eq!(a_node.label, "a");

  // b was built as a child of a, and its reference resolved.
  assert!(b.reference().is_resolved());
  let b_node = b.reference().resolved().unwrap();
  assert_eq!(b_node.label, "b");

  // Both halves of the cycle point at each other through references.
  assert!(Arc::ptr_eq(&a_node.partner.resolved().unwrap(), &b_node));
  assert!(Arc::ptr_eq(&b_node.partner.resolved().unwrap(), &a_node));
}

#[test]
fn inner_cycle_member_observes_an_unresolved_forward_reference() {
  let a = NodeBuilder::new("a");
  let b = NodeBuilder::new("b");
  a.set_partner(&b);
  b.set_partner(&a);

  a.build();

  // b instantiated while a was still mid-build, so a's reference was not
  // yet resolved at that point; a instantiated last and saw b resolved.
  assert!(b.partner_unresolved_at_instantiate.load(Ordering::SeqCst));
  assert!(!a.partner_unresolved_at_instantiate.load(Ordering::SeqCst));
}

#[test]
fn forward_reference_resolves_when_its_builder_is_built_later() {
  let a = NodeBuilder::new("a");
  let b = NodeBuilder::new("b");
  a.set_partner(&b);
  // b does not build a; it only hands out its reference.

  let a_result = a.build();
  let a_node = a_result.success().unwrap().value().unwrap();

  // a holds b's reference; b built as a's child, so it resolved already.
  assert!(a_node.partner.is_resolved());

  // A standalone builder's reference stays unresolved until it builds.
  let lone = NodeBuilder::new("lone");
  let reference = lone.reference();
  assert!(!reference.is_resolved());
  lone.build();
  assert_eq!(reference.resolved().unwrap().label, "lone");
}

#[test]
fn self_cycle_terminates() {
  let node = NodeBuilder::new("ouroboros");
  node.set_partner(&node);

  let result = node.build();

  let value = result.success().unwrap().value().unwrap();
  assert!(Arc::ptr_eq(&value.partner.resolved().unwrap(), &value));
}

#[test]
fn cycle_validation_terminates_and_reports_no_spurious_failures() {
  let a = NodeBuilder::new("a");
  let b = NodeBuilder::new("b");
  a.set_partner(&b);
  b.set_partner(&a);

  let mut visited = VisitedSet::new();
  let mut failures = FailuresDictionary::new();
  a.validate(&mut visited, &mut failures);

  assert!(!failures.has_failures());
  assert_eq!(a.validation_status(), ValidationStatus::Validated);
  assert_eq!(b.validation_status(), ValidationStatus::Validated);
}

// ============================================================================
// Callbacks
// ============================================================================

#[test]
fn on_built_fires_with_the_produced_value() {
  let builder = CounterBuilder {
    value: 8,
    ..CounterBuilder::default()
  };
  let seen = Arc::new(AtomicUsize::new(0));

  let slot = Arc::clone(&seen);
  builder.on_built(move |value| slot.store(**value, Ordering::SeqCst));
  builder.build();

  assert_eq!(seen.load(Ordering::SeqCst), 8);
}

#[test]
fn on_built_after_build_is_dropped() {
  let builder = CounterBuilder::default();
  builder.build();

  let called = Arc::new(AtomicBool::new(false));
  let flag = Arc::clone(&called);
  builder.on_built(move |_| flag.store(true, Ordering::SeqCst));

  assert!(!called.load(Ordering::SeqCst));
}

#[test]
fn reference_callbacks_fire_during_build() {
  let builder = CounterBuilder {
    value: 3,
    ..CounterBuilder::default()
  };
  let seen = Arc::new(AtomicUsize::new(0));

  let slot = Arc::clone(&seen);
  builder.reference().on_resolve(move |value| slot.store(**value, Ordering::SeqCst));
  builder.build();

  assert_eq!(seen.load(Ordering::SeqCst), 3);
}
