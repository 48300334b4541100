//! Path cache: spatial key → ordered waypoint sequence.
//!
//! Entries carry no surface version, so every surface rebuild must purge the
//! whole cache. The map sits behind a `RwLock`, which makes `purge_all` safe
//! to call from any thread while another holder of the cache is writing.

use crate::key::SpatialKey;
use crate::types::Vec3;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Waypoints in traversal order, source first.
pub type CachedPath = Arc<[Vec3]>;

pub struct PathCache {
    entries: RwLock<FxHashMap<SpatialKey, CachedPath>>,
    purges: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PathCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            purges: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a path. A miss is a normal outcome, not an error.
    pub fn get(&self, key: SpatialKey) -> Option<CachedPath> {
        let found = self.entries.read().get(&key).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Lookup that does not touch the hit/miss counters.
    pub fn peek(&self, key: SpatialKey) -> Option<CachedPath> {
        self.entries.read().get(&key).cloned()
    }

    pub fn contains(&self, key: SpatialKey) -> bool {
        self.entries.read().contains_key(&key)
    }

    /// Store `path` under `key`, replacing whatever was there.
    pub fn set(&self, key: SpatialKey, path: impl Into<CachedPath>) {
        self.entries.write().insert(key, path.into());
    }

    pub fn remove(&self, key: SpatialKey) -> Option<CachedPath> {
        self.entries.write().remove(&key)
    }

    /// Drop every entry. Returns how many entries were removed.
    pub fn purge_all(&self) -> usize {
        let mut entries = self.entries.write();
        let removed = entries.len();
        entries.clear();
        self.purges.fetch_add(1, Ordering::AcqRel);
        removed
    }

    /// Number of purges performed so far.
    pub fn purge_count(&self) -> u64 {
        self.purges.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new()
    }
}
