//! # BuildWeave
//!
//! Deferred, cycle-tolerant object-graph construction in pure Rust.
//!
//! BuildWeave lets callers assemble immutable domain objects through chained
//! builder calls, where builders may reference each other in cycles before
//! any of them has produced a value. The engine resolves those forward
//! references, validates the whole graph, aggregates failures per field, and
//! guarantees every builder is instantiated and validated **at most once**,
//! even under concurrent invocation from multiple threads.
//!
//! ## Key Properties
//!
//! - **Deferred references**: obtain a [`reference::Reference`] to a value
//!   before it exists; it resolves exactly once, when its builder finishes.
//! - **Cycle-tolerant**: traversals carry an explicit
//!   [`visited::VisitedSet`] keyed by builder identity; a builder reached
//!   twice in one traversal is a cycle break, not infinite recursion.
//! - **Build-once / validate-once**: double-checked memoization under a
//!   pluggable [`sync_strategy::SyncStrategy`] ensures the expensive domain
//!   hooks run at most once per builder, no matter how many threads call in.
//! - **Aggregated failures**: validation visits every field and child,
//!   collecting a [`failure::FailuresDictionary`] instead of stopping at the
//!   first problem.
//!
//! ## Quick Start
//!
//! A domain builder embeds a [`builder::BuilderCore`] and supplies three
//! hooks; everything else - `build`, `validate`, `reference`, memoization,
//! cycle handling - comes from the blanket [`builder::Builder`] contract.
//! See the [`builder`] module docs for a complete example.
//!
//! The engine creates no threads and never suspends: calls either return
//! synchronously or block on the chosen strategy. There are no timeouts.

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Builder orchestration: the domain-hook trait, the shared core, and the
/// public build/validate contract.
pub mod builder;
/// Ordered collections of child builders with bulk operations.
pub mod builder_list;
/// Structured per-field failures and their aggregation into hard errors.
pub mod failure;
/// Builder identity and the build/validation status machines.
pub mod identity;
/// Write-once forward references with resolution callbacks.
pub mod reference;
/// Pluggable concurrency policies for the build/validate critical sections.
pub mod sync_strategy;
/// Traversal-scoped cycle detection.
pub mod visited;

#[cfg(test)]
mod reference_test;
