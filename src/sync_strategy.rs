//! # Synchronization Strategies
//!
//! A [`SyncStrategy`] is the pluggable concurrency policy wrapping the
//! build/validate critical sections. The engine never creates threads; the
//! strategy only decides how caller threads serialize when they reach the
//! expensive paths.
//!
//! ## Variants
//!
//! - **[`NoopStrategy`]**: zero serialization. Only safe when a builder is
//!   confined to one thread.
//! - **[`ExclusiveStrategy`]**: one reentrant mutex serializes read and
//!   write sections alike.
//! - **[`ReadWriteStrategy`]**: concurrent readers, exclusive writers. May
//!   be shared by several builders through one `Arc` so their critical
//!   sections serialize against each other.
//!
//! ## Reentrancy
//!
//! Build recurses: a write section routinely opens another write section on
//! the same strategy instance (a builder validating inside its own build, a
//! parent building a child that shares the parent's strategy). Nested
//! write-in-write and read-in-read acquisitions on one thread therefore
//! must succeed without deadlock, and every provided strategy guarantees
//! that. Upgrading - opening a write section while holding only a read
//! section - is not supported and will deadlock on [`ReadWriteStrategy`].
//!
//! There are no timeouts: a blocked section waits indefinitely.

use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicU64, Ordering};

/// Returns a process-unique token for the calling thread. Never zero.
fn thread_token() -> u64 {
  static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);
  thread_local! {
    static TOKEN: u64 = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
  }
  TOKEN.with(|token| *token)
}

/// Concurrency policy for a builder's critical sections.
///
/// `read_section` guards read-style access (status inspection);
/// `write_section` guards the build/validate critical sections. The returned
/// [`SectionGuard`] holds the section until dropped.
pub trait SyncStrategy: Send + Sync {
  /// Enters a read-style section, blocking until admitted.
  fn read_section(&self) -> SectionGuard<'_>;

  /// Enters a write-style section, blocking until admitted.
  fn write_section(&self) -> SectionGuard<'_>;
}

/// RAII guard for an entered section; the section ends when this drops.
pub struct SectionGuard<'a> {
  _inner: GuardInner<'a>,
}

impl SectionGuard<'_> {
  /// A guard that holds nothing.
  ///
  /// For custom [`SyncStrategy`] implementations whose sections need no
  /// release step, and for re-entered sections already held by the calling
  /// thread.
  pub fn unguarded() -> Self {
    SectionGuard {
      _inner: GuardInner::Unguarded,
    }
  }
}

enum GuardInner<'a> {
  Unguarded,
  Exclusive(#[allow(dead_code)] ReentrantMutexGuard<'a, ()>),
  Read(#[allow(dead_code)] RwLockReadGuard<'a, ()>),
  Write(#[allow(dead_code)] WriteGuard<'a>),
}

struct WriteGuard<'a> {
  guard: Option<RwLockWriteGuard<'a, ()>>,
  owner: &'a AtomicU64,
}

impl Drop for WriteGuard<'_> {
  fn drop(&mut self) {
    // The owner mark must clear before the lock releases, or the next
    // writer could acquire the lock and then have its mark clobbered.
    self.owner.store(0, Ordering::Release);
    self.guard.take();
  }
}

/// No serialization at all.
///
/// Sections are free; the caller must guarantee the builder is never touched
/// from two threads at once.
#[derive(Debug, Default)]
pub struct NoopStrategy;

impl NoopStrategy {
  /// Creates the no-op strategy.
  pub fn new() -> Self {
    NoopStrategy
  }
}

impl SyncStrategy for NoopStrategy {
  fn read_section(&self) -> SectionGuard<'_> {
    SectionGuard::unguarded()
  }

  fn write_section(&self) -> SectionGuard<'_> {
    SectionGuard::unguarded()
  }
}

/// One mutual-exclusion lock around every section.
///
/// Read and write sections are equivalent; the lock is reentrant, so nested
/// sections on the owning thread enter immediately.
#[derive(Debug, Default)]
pub struct ExclusiveStrategy {
  lock: ReentrantMutex<()>,
}

impl ExclusiveStrategy {
  /// Creates an exclusive strategy with its own lock.
  pub fn new() -> Self {
    ExclusiveStrategy {
      lock: ReentrantMutex::new(()),
    }
  }
}

impl SyncStrategy for ExclusiveStrategy {
  fn read_section(&self) -> SectionGuard<'_> {
    SectionGuard {
      _inner: GuardInner::Exclusive(self.lock.lock()),
    }
  }

  fn write_section(&self) -> SectionGuard<'_> {
    SectionGuard {
      _inner: GuardInner::Exclusive(self.lock.lock()),
    }
  }
}

/// Concurrent readers, exclusive writers.
///
/// Read sections admit any number of threads together; write sections are
/// mutually exclusive with each other and with readers. The strategy records
/// which thread holds the write lock, so nested write and read sections on
/// that thread re-enter instead of deadlocking. Reads nest via recursive
/// read locking.
#[derive(Debug, Default)]
pub struct ReadWriteStrategy {
  lock: RwLock<()>,
  writer: AtomicU64,
}

impl ReadWriteStrategy {
  /// Creates a reader/writer strategy with its own lock.
  pub fn new() -> Self {
    ReadWriteStrategy {
      lock: RwLock::new(()),
      writer: AtomicU64::new(0),
    }
  }
}

impl SyncStrategy for ReadWriteStrategy {
  fn read_section(&self) -> SectionGuard<'_> {
    if self.writer.load(Ordering::Acquire) == thread_token() {
      return SectionGuard::unguarded();
    }
    SectionGuard {
      _inner: GuardInner::Read(self.lock.read_recursive()),
    }
  }

  fn write_section(&self) -> SectionGuard<'_> {
    let token = thread_token();
    if self.writer.load(Ordering::Acquire) == token {
      return SectionGuard::unguarded();
    }
    let guard = self.lock.write();
    self.writer.store(token, Ordering::Release);
    SectionGuard {
      _inner: GuardInner::Write(WriteGuard {
        guard: Some(guard),
        owner: &self.writer,
      }),
    }
  }
}
