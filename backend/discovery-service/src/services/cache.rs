//! In-process TTL cache with LRU capacity eviction
//!
//! Memoizes composed search responses and related-candidate retrievals.
//! Expiry is checked lazily on read and eagerly by `sweep` (run
//! periodically via `spawn_sweeper`). Entries are idempotent derivations
//! of their inputs, so concurrent last-writer-wins stores are safe.
//!
//! Time arithmetic uses `tokio::time::Instant` so TTL behavior is
//! deterministic under a paused test clock.

use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::models::{SearchFilters, SearchRequest};

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub last_accessed_at: Instant,
    pub hit_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    /// Rough lower bound: entry headers plus key bytes. Heap data held
    /// by values is not traversed.
    pub approx_bytes: usize,
}

struct CacheState<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    max_size: usize,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

pub struct SearchCache<T> {
    state: Arc<CacheState<T>>,
}

impl<T> Clone for SearchCache<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone> SearchCache<T> {
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            state: Arc::new(CacheState {
                entries: Mutex::new(HashMap::new()),
                max_size,
                default_ttl,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    /// Lookup with lazy expiry: a stale entry is removed and counted as
    /// a miss. A hit refreshes `last_accessed_at`.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let mut entries = self.lock_entries();

        match entries.get_mut(key) {
            Some(entry) if now > entry.expires_at => {
                entries.remove(key);
                self.state.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(entry) => {
                entry.last_accessed_at = now;
                entry.hit_count += 1;
                self.state.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            None => {
                self.state.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn set(&self, key: &str, value: T, ttl: Option<Duration>) {
        let now = Instant::now();
        let ttl = ttl.unwrap_or(self.state.default_ttl);
        let mut entries = self.lock_entries();

        if !entries.contains_key(key) && entries.len() >= self.state.max_size {
            Self::evict_lru(&mut entries);
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl,
                last_accessed_at: now,
                hit_count: 0,
            },
        );
    }

    pub fn delete(&self, key: &str) -> bool {
        self.lock_entries().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock_entries().clear();
    }

    /// Eager expiry pass; returns the number of entries removed
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock_entries();
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.expires_at);
        before - entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.lock_entries();
        let key_bytes: usize = entries.keys().map(|k| k.len()).sum();
        CacheStats {
            size: entries.len(),
            hits: self.state.hits.load(Ordering::Relaxed),
            misses: self.state.misses.load(Ordering::Relaxed),
            approx_bytes: entries.len() * mem::size_of::<CacheEntry<T>>() + key_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_lru(entries: &mut HashMap<String, CacheEntry<T>>) {
        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            entries.remove(&key);
        }
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
        self.state.entries.lock().expect("cache lock poisoned")
    }
}

impl<T: Clone + Send + 'static> SearchCache<T> {
    /// Periodic maintenance task for eager expiry
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                let removed = cache.sweep();
                if removed > 0 {
                    debug!(removed, "cache sweep removed expired entries");
                }
            }
        })
    }
}

/// Deterministic cache key for a query shape: term, type, filters
/// (order-independent), pagination and sorting.
pub fn search_cache_key(prefix: &str, request: &SearchRequest, limit: u32, offset: u32) -> String {
    format!(
        "{}:{}:{}:{}:{}:{}:{}:{}:{:?}",
        prefix,
        request.searcher_user_id,
        request.search_type.as_str(),
        request.term,
        canonical_filters(&request.filters),
        limit,
        offset,
        match request.sorting.field {
            crate::models::SortField::Score => "score",
            crate::models::SortField::Followers => "followers",
            crate::models::SortField::Distance => "distance",
        },
        request.sorting.direction,
    )
}

fn canonical_filters(filters: &SearchFilters) -> String {
    let mut interests = filters.interests.clone();
    interests.sort();

    let mut fields = vec![
        format!("interests={}", interests.join("+")),
        format!(
            "max_distance_km={}",
            filters
                .max_distance_km
                .map(|v| v.to_string())
                .unwrap_or_default()
        ),
        format!(
            "min_followers={}",
            filters
                .min_followers
                .map(|v| v.to_string())
                .unwrap_or_default()
        ),
        format!("verified_only={}", filters.verified_only),
    ];
    fields.sort();
    fields.join("&")
}
