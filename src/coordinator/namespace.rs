//! The coarse namespace lock
//!
//! Block-to-storage membership and the cache-pipeline lists must change
//! atomically with the global block index, which spans every datanode.
//! Those operations take a `&NamespaceGuard` argument. A guard can only be
//! obtained from [`NamespaceLock::lock`], so calling them without holding the
//! lock does not compile.
//!
//! Every lock carries a process-unique id that its guards report. A
//! datanode record is bound to one lock and rejects guards of any other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(1);

/// The single system-wide lock owned by the namespace manager.
#[derive(Debug)]
pub struct NamespaceLock {
    id: u64,
    inner: Mutex<()>,
}

/// Proof that the caller holds the [`NamespaceLock`].
#[derive(Debug)]
pub struct NamespaceGuard<'a> {
    lock_id: u64,
    _held: MutexGuard<'a, ()>,
}

impl NamespaceGuard<'_> {
    /// Id of the lock this guard holds.
    pub fn lock_id(&self) -> u64 {
        self.lock_id
    }
}

impl NamespaceLock {
    pub fn new() -> Self {
        Self {
            id: NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed),
            inner: Mutex::new(()),
        }
    }

    /// Never 0.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Acquire the lock. A panic while holding it (a broken membership
    /// invariant) poisons the mutex; later callers still get the guard, as
    /// the enclosing transaction decides whether to abort.
    pub fn lock(&self) -> NamespaceGuard<'_> {
        let held = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("namespace lock poisoned by a failed operation");
                poisoned.into_inner()
            }
        };
        NamespaceGuard {
            lock_id: self.id,
            _held: held,
        }
    }

    /// Non-blocking variant, mostly for diagnostics.
    pub fn try_lock(&self) -> Option<NamespaceGuard<'_>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(NamespaceGuard {
                lock_id: self.id,
                _held: guard,
            }),
            Err(std::sync::TryLockError::Poisoned(poisoned)) => Some(NamespaceGuard {
                lock_id: self.id,
                _held: poisoned.into_inner(),
            }),
            Err(std::sync::TryLockError::WouldBlock) => None,
        }
    }
}

impl Default for NamespaceLock {
    fn default() -> Self {
        Self::new()
    }
}
