//! Per-key mutation locks.
//!
//! Mutations on the same key run one after another; mutations on disjoint
//! keys run concurrently. A mutation takes every lock it needs in sorted key
//! order, so two mutations with overlapping key sets cannot deadlock.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::entry::CacheKey;

#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: DashMap<CacheKey, Arc<Mutex<()>>>,
}

/// Locks held for one mutation. Released on drop.
#[derive(Debug)]
#[must_use = "locks are released as soon as the guard is dropped"]
pub struct KeyGuard<'a> {
    owner: &'a KeyLocks,
    keys: Vec<CacheKey>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the locks for `keys`, waiting for any mutation holding one.
    pub async fn acquire(&self, keys: &[CacheKey]) -> KeyGuard<'_> {
        let mut sorted = keys.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for key in &sorted {
            let lock = self.locks.entry(key.clone()).or_default().clone();
            guards.push(lock.lock_owned().await);
        }

        KeyGuard {
            owner: self,
            keys: sorted,
            guards,
        }
    }

    /// Number of keys with a live lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl KeyGuard<'_> {
    pub fn keys(&self) -> &[CacheKey] {
        &self.keys
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.guards.clear();
        for key in &self.keys {
            self.owner
                .locks
                .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}
