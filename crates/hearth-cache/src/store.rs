//! Normalized entity cache.
//!
//! Entries are stored once per [`CacheKey`] and recorded against the query
//! results that fetched them. An entry lives as long as at least one owning
//! query does.
//!
//! Reads are public. Writes other than query population are crate-private
//! and go through [`NormalizedCache::write_if_unchanged`], which only touches
//! an entry if it is still in the state the caller last observed. That keeps
//! a late rollback or reconciliation from clobbering data that was re-fetched
//! or evicted in the meantime.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::entry::{CacheEntry, CacheKey, EntityType};

/// Identifier of a query result that populated the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(String);

impl QueryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueryId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// State of a set of keys: `None` means absent.
pub type Snapshot = BTreeMap<CacheKey, Option<CacheEntry>>;

#[derive(Debug, Clone)]
struct Slot {
    entry: CacheEntry,
    version: u64,
}

/// Observed state of keys a writer holds: the entry version, or `None` for
/// an entry the writer knows to be absent.
#[derive(Debug, Clone, Default)]
pub(crate) struct Stamp(HashMap<CacheKey, Option<u64>>);

impl Stamp {
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self.0.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Result of a conditional write.
#[derive(Debug, Default)]
pub(crate) struct WriteReport {
    /// State of the keys that were written.
    pub(crate) stamp: Stamp,
    /// Keys left alone because they changed since they were observed.
    pub(crate) skipped: Vec<CacheKey>,
}

#[derive(Debug, Default)]
struct Ownership {
    by_query: HashMap<QueryId, HashSet<CacheKey>>,
    by_key: HashMap<CacheKey, HashSet<QueryId>>,
}

impl Ownership {
    /// Drops `query`'s claim on `key`. Returns `true` when no owner remains.
    fn release(&mut self, key: &CacheKey, query: &QueryId) -> bool {
        let Some(owners) = self.by_key.get_mut(key) else {
            return true;
        };
        owners.remove(query);
        if owners.is_empty() {
            self.by_key.remove(key);
            true
        } else {
            false
        }
    }

    fn is_owned(&self, key: &CacheKey) -> bool {
        self.by_key.contains_key(key)
    }
}

/// Process-wide normalized cache.
///
/// Readers never block on a pending mutation: they see the optimistic state
/// while it is in place, and the reconciled or restored state afterwards.
#[derive(Debug, Default)]
pub struct NormalizedCache {
    entries: DashMap<CacheKey, Slot>,
    // Lock order: ownership before any `entries` shard.
    ownership: RwLock<Ownership>,
    versions: AtomicU64,
}

impl NormalizedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.get(key).map(|slot| slot.entry.clone())
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted keys of every cached entry of `entity`.
    pub fn keys_of(&self, entity: EntityType) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|e| e.key().entity == entity)
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Every cached entry of `entity`, in key order.
    pub fn entries_of(&self, entity: EntityType) -> Vec<CacheEntry> {
        self.keys_of(entity)
            .iter()
            .filter_map(|key| self.get(key))
            .collect()
    }

    /// Queries currently holding `key`.
    pub fn owners(&self, key: &CacheKey) -> Vec<QueryId> {
        let ownership = self.ownership.read();
        let mut owners: Vec<QueryId> = ownership
            .by_key
            .get(key)
            .map(|o| o.iter().cloned().collect())
            .unwrap_or_default();
        owners.sort();
        owners
    }

    /// Stores the result of `query`, replacing what it fetched before.
    ///
    /// Entries the query no longer returns are evicted unless another query
    /// still owns them.
    pub fn populate(&self, query: &QueryId, entries: impl IntoIterator<Item = CacheEntry>) {
        let mut ownership = self.ownership.write();

        let mut fetched = HashSet::new();
        for entry in entries {
            let key = entry.key();
            self.entries.insert(
                key.clone(),
                Slot {
                    entry,
                    version: self.next_version(),
                },
            );
            ownership
                .by_key
                .entry(key.clone())
                .or_default()
                .insert(query.clone());
            fetched.insert(key);
        }

        let previous = ownership
            .by_query
            .insert(query.clone(), fetched.clone())
            .unwrap_or_default();
        let mut evicted = 0;
        for key in previous.difference(&fetched) {
            if ownership.release(key, query) {
                self.entries.remove(key);
                evicted += 1;
            }
        }

        debug!(query = %query, entries = fetched.len(), evicted, "Populated query result");
    }

    /// Discards the result of `query`.
    ///
    /// Returns the keys that were evicted because no other query owns them.
    pub fn evict_query(&self, query: &QueryId) -> Vec<CacheKey> {
        let mut ownership = self.ownership.write();
        let Some(keys) = ownership.by_query.remove(query) else {
            return Vec::new();
        };

        let mut evicted: Vec<CacheKey> = keys
            .into_iter()
            .filter(|key| ownership.release(key, query))
            .collect();
        for key in &evicted {
            self.entries.remove(key);
        }
        evicted.sort();

        debug!(query = %query, evicted = evicted.len(), "Evicted query result");
        evicted
    }

    /// Captures the current state of `keys`.
    pub(crate) fn capture(&self, keys: &[CacheKey]) -> (Snapshot, Stamp) {
        let _ownership = self.ownership.read();
        let mut snapshot = Snapshot::new();
        let mut stamp = Stamp::default();
        for key in keys {
            let slot = self.entries.get(key).map(|s| s.value().clone());
            stamp.0.insert(key.clone(), slot.as_ref().map(|s| s.version));
            snapshot.insert(key.clone(), slot.map(|s| s.entry));
        }
        (snapshot, stamp)
    }

    /// Writes `target` for every key still in the state recorded in
    /// `expected`.
    ///
    /// A key is skipped when it is missing from `expected`, when its version
    /// moved on, or when it was evicted. An absent key is only (re)inserted
    /// while some query still owns it.
    pub(crate) fn write_if_unchanged(&self, target: &Snapshot, expected: &Stamp) -> WriteReport {
        let ownership = self.ownership.read();
        let mut report = WriteReport::default();

        for (key, entry) in target {
            let Some(observed) = expected.0.get(key) else {
                report.skipped.push(key.clone());
                continue;
            };
            let current = self.entries.get(key).map(|s| s.version);
            let unchanged = match (current, observed) {
                (Some(now), Some(seen)) => now == *seen,
                (None, None) => entry.is_none() || ownership.is_owned(key),
                _ => false,
            };
            if !unchanged {
                report.skipped.push(key.clone());
                continue;
            }

            let written = match entry {
                Some(entry) => {
                    let version = self.next_version();
                    self.entries.insert(
                        key.clone(),
                        Slot {
                            entry: entry.clone(),
                            version,
                        },
                    );
                    Some(version)
                }
                None => {
                    self.entries.remove(key);
                    None
                }
            };
            report.stamp.0.insert(key.clone(), written);
        }

        report
    }

    /// Forgets ownership of keys a committed mutation removed.
    pub(crate) fn settle(&self, stamp: &Stamp) {
        let removed: Vec<&CacheKey> = stamp
            .0
            .iter()
            .filter(|(_, version)| version.is_none())
            .map(|(key, _)| key)
            .collect();
        if removed.is_empty() {
            return;
        }

        let mut ownership = self.ownership.write();
        for key in removed {
            if self.entries.contains_key(key) {
                continue;
            }
            if let Some(owners) = ownership.by_key.remove(key) {
                for query in owners {
                    if let Some(keys) = ownership.by_query.get_mut(&query) {
                        keys.remove(key);
                    }
                }
            }
        }
    }

    fn next_version(&self) -> u64 {
        self.versions.fetch_add(1, Ordering::Relaxed) + 1
    }
}
