//! Memoization of resolution outcomes.
//!
//! Keys are normalized queries, so `FedEx 2Day, zone 5, 3 lb` and
//! `  fedex 2day,   ZONE 5, 3 LB ` share an entry. The caller decides which
//! outcomes are stored; see [`ResultCache::get_or_compute_if`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tracing::trace;

use crate::resolver::Outcome;

#[derive(Debug, Clone)]
struct CacheEntry {
    outcome: Outcome,
    created_at: Instant,
}

/// Concurrent outcome cache with optional expiry.
#[derive(Debug)]
pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ResultCache {
    /// `ttl = None` keeps entries until [`ResultCache::clear`].
    pub fn new(ttl: Option<Duration>) -> Self {
        ResultCache { entries: DashMap::new(), ttl, hits: AtomicU64::new(0), misses: AtomicU64::new(0) }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.ttl.is_some_and(|ttl| entry.created_at.elapsed() >= ttl)
    }

    /// Cached outcome for `raw`, counting a hit or a miss.
    pub fn get(&self, raw: &str) -> Option<Outcome> {
        let key = normalize_key(raw);
        // Clone out before touching the map again; holding a `Ref` while
        // removing the same key deadlocks the shard.
        let cached = self.entries.get(&key).map(|e| (e.outcome.clone(), self.is_expired(&e)));

        match cached {
            Some((outcome, false)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "cache hit");
                Some(outcome)
            }
            Some((_, true)) => {
                self.entries.remove_if(&key, |_, e| self.is_expired(e));
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "cache entry expired");
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, raw: &str, outcome: Outcome) {
        self.entries.insert(normalize_key(raw), CacheEntry { outcome, created_at: Instant::now() });
    }

    /// Return the cached outcome or compute, store and return a fresh one.
    ///
    /// `compute` runs without any map lock held. Two threads racing on the
    /// same key may both compute; the later insert wins and both results are
    /// equivalent.
    pub fn get_or_compute(&self, raw: &str, compute: impl FnOnce() -> Outcome) -> Outcome {
        self.get_or_compute_if(raw, compute, |_| true)
    }

    /// Like [`ResultCache::get_or_compute`], but a fresh outcome is only
    /// stored when `keep` accepts it. Only outcomes whose content depends
    /// solely on the normalized key should be kept.
    pub fn get_or_compute_if(
        &self,
        raw: &str,
        compute: impl FnOnce() -> Outcome,
        keep: impl FnOnce(&Outcome) -> bool,
    ) -> Outcome {
        if let Some(outcome) = self.get(raw) {
            return outcome;
        }
        let outcome = compute();
        if keep(&outcome) {
            self.insert(raw, outcome.clone());
        }
        outcome
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Remove expired entries and return how many were dropped.
    pub fn purge_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let before = self.entries.len();
        self.entries.retain(|_, e| !self.is_expired(e));
        before.saturating_sub(self.entries.len())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ttl_secs: self.ttl.map(|t| t.as_secs()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// `None` when entries never expire.
    pub ttl_secs: Option<u64>,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

/// Trim, lower-case and collapse internal whitespace.
pub fn normalize_key(raw: &str) -> String {
    raw.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{QueryParseError, ResolveError};
    use crate::resolver::ResolutionFailure;
    use std::cell::Cell;

    fn failure() -> Outcome {
        Err(ResolutionFailure::new(ResolveError::Parse(QueryParseError::Empty), Duration::ZERO))
    }

    #[test]
    fn keys_ignore_case_and_spacing() {
        assert_eq!(normalize_key("  FedEx   2Day,\tZone 5 "), "fedex 2day, zone 5");
    }

    #[test]
    fn second_lookup_is_a_hit() {
        let cache = ResultCache::default();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            failure()
        };

        let first = cache.get_or_compute("Zone 5", compute);
        let second = cache.get_or_compute("  zone   5 ", compute);
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);

        let stats = cache.stats();
        assert_eq!((stats.entries, stats.hits, stats.misses), (1, 1, 1));
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn rejected_outcomes_are_not_stored() {
        let cache = ResultCache::default();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            failure()
        };

        cache.get_or_compute_if("q", compute, |_| false);
        cache.get_or_compute_if("q", compute, |_| false);
        assert_eq!(calls.get(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_entries_are_recomputed() {
        let cache = ResultCache::new(Some(Duration::ZERO));
        cache.insert("q", failure());
        assert!(cache.get("q").is_none());
        assert!(cache.is_empty());

        cache.insert("q", failure());
        assert_eq!(cache.purge_expired(), 1);
    }

    #[test]
    fn without_ttl_nothing_expires() {
        let cache = ResultCache::new(None);
        cache.insert("q", failure());
        assert_eq!(cache.purge_expired(), 0);
        assert!(cache.get("q").is_some());
        assert_eq!(cache.stats().ttl_secs, None);
    }

    #[test]
    fn clear_drops_entries_and_counters() {
        let cache = ResultCache::new(Some(Duration::from_secs(60)));
        cache.get_or_compute("q", failure);
        cache.get_or_compute("q", failure);
        cache.clear();
        assert_eq!(cache.stats(), CacheStats { entries: 0, hits: 0, misses: 0, ttl_secs: Some(60) });
    }
}
