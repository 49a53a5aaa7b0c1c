//! In-process read cache for resolved fragments
//!
//! A [`FragmentCache`] maps FIDs to decoded fragments, bounded by entry
//! count with least-recently-used eviction. Each fragment store handle
//! owns its own cache (no global singleton), so multiple independently
//! cached stores can coexist in one process.
//!
//! Because fragments are immutable, a cache hit is observationally
//! equivalent to a store fetch, concurrent fills for the same FID are
//! harmless (last writer wins), and no single-flight coordination is
//! required.

use crate::fid::Fid;
use crate::fragment::Fragment;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Default cache capacity in fragments
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Cache statistics
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of evictions
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate in `0.0..=1.0`
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct LruInner {
    /// FID -> (last-use stamp, fragment)
    entries: HashMap<Fid, (u64, Arc<Fragment>)>,
    /// Monotonic use counter
    tick: u64,
}

impl LruInner {
    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// Count-bounded LRU cache of resolved fragments
#[derive(Debug)]
pub struct FragmentCache {
    inner: RwLock<LruInner>,
    capacity: usize,
    stats: RwLock<CacheStats>,
}

impl FragmentCache {
    /// Create a cache bounded at `capacity` fragments
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(LruInner::default()),
            capacity: capacity.max(1),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Look up a fragment, marking it most recently used
    pub fn get(&self, fid: &Fid) -> Option<Arc<Fragment>> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        let stamp = inner.touch();
        let found = inner.entries.get_mut(fid).map(|slot| {
            slot.0 = stamp;
            slot.1.clone()
        });
        let mut stats = self.stats.write().expect("RwLock poisoned");
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        found
    }

    /// Insert a fragment, evicting the least recently used entry if full
    ///
    /// Last writer wins on a per-FID basis; values are immutable so a
    /// racing overwrite is indistinguishable from the original.
    pub fn insert(&self, fid: Fid, fragment: Arc<Fragment>) {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        if !inner.entries.contains_key(&fid) && inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, (stamp, _))| *stamp)
                .map(|(k, _)| *k);
            if let Some(victim) = oldest {
                inner.entries.remove(&victim);
                self.stats.write().expect("RwLock poisoned").evictions += 1;
            }
        }
        let stamp = inner.touch();
        inner.entries.insert(fid, (stamp, fragment));
    }

    /// Current number of cached fragments
    pub fn len(&self) -> usize {
        self.inner.read().expect("RwLock poisoned").entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.inner.write().expect("RwLock poisoned").entries.clear();
    }

    /// Snapshot of hit/miss/eviction counters
    pub fn stats(&self) -> CacheStats {
        *self.stats.read().expect("RwLock poisoned")
    }
}

impl Default for FragmentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
