//! Rank lookup cache.
//!
//! Bounded LRU map from page URL to rank, shared by the import workers of one
//! `uservisits` run. Misses fall through to a point lookup on the rankings
//! collection.
//!
//! The lock is held across the lookup, so workers missing on the same URL at
//! once wait for the first query and then hit.

use crate::store::DocumentStore;
use crate::{Error, Result};
use bdbench_core::metrics;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of lookups answered from memory.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct RankCache {
    store: Arc<dyn DocumentStore>,
    entries: Mutex<LruCache<String, i32>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl RankCache {
    pub fn new(store: Arc<dyn DocumentStore>, capacity: NonZeroUsize) -> Self {
        Self {
            store,
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// The rank of `url`, from memory or the rankings collection.
    ///
    /// A URL with no ranking is [`Error::JoinKeyNotFound`].
    pub fn get_or_load(&self, url: &str) -> Result<i32> {
        let mut entries = self.entries.lock();
        if let Some(&rank) = entries.get(url) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::increment("lookup_cache_hits_total", 1);
            return Ok(rank);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::increment("lookup_cache_misses_total", 1);

        let rank = self
            .store
            .find_page_rank(url)?
            .ok_or_else(|| Error::JoinKeyNotFound {
                url: url.to_string(),
            })?;

        if let Some((evicted, _)) = entries.push(url.to_string(), rank)
            && evicted != url
        {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        Ok(rank)
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: entries.len(),
            capacity: entries.cap().get(),
        }
    }
}
