//! TTL- and capacity-bounded response cache.

use metrics::counter;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Deterministic fingerprint of a request.
///
/// Parameters are sorted before hashing, so the same logical request maps to
/// the same key regardless of parameter order.
pub fn cache_key<I, K, V>(method: &str, url: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<(String, String)> = params
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect();
    pairs.sort();

    let canonical = serde_json::to_string(&pairs).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b":");
    hasher.update(url.as_bytes());
    hasher.update(b":");
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    last_access: Instant,
}

#[derive(Debug)]
struct Store<V> {
    entries: HashMap<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
}

/// Snapshot returned by [`ResponseCache::stats`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_items: usize,
    pub expired_items: usize,
    pub valid_items: usize,
    pub max_size: usize,
    pub ttl_seconds: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
}

/// Cache with per-entry TTL and least-recently-used eviction.
///
/// Every operation runs under one lock, so reads, writes and evictions never
/// interleave.
#[derive(Debug)]
pub struct ResponseCache<V = serde_json::Value> {
    ttl: Duration,
    max_size: usize,
    store: Mutex<Store<V>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            ttl,
            max_size: max_size.max(1),
            store: Mutex::new(Store {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Look up a live entry, refreshing its access time.
    ///
    /// An expired entry is removed and reported as absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut store = self.lock();
        let now = Instant::now();

        let expired = match store.entries.get_mut(key) {
            None => {
                store.misses += 1;
                counter!("fusion_cache_misses_total").increment(1);
                return None;
            }
            Some(entry) if now - entry.stored_at > self.ttl => true,
            Some(entry) => {
                entry.last_access = now;
                let value = entry.value.clone();
                store.hits += 1;
                counter!("fusion_cache_hits_total").increment(1);
                return Some(value);
            }
        };

        if expired {
            store.entries.remove(key);
        }
        store.misses += 1;
        counter!("fusion_cache_misses_total").increment(1);
        None
    }

    /// Insert or replace an entry.
    ///
    /// Expired entries are swept first, then least-recently-used entries are
    /// evicted until there is room.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let mut store = self.lock();
        let now = Instant::now();

        let ttl = self.ttl;
        store.entries.retain(|_, entry| now - entry.stored_at <= ttl);

        // Overwriting never needs room
        if !store.entries.contains_key(&key) {
            while store.entries.len() >= self.max_size {
                let lru = store
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_access)
                    .map(|(k, _)| k.clone());
                match lru {
                    Some(lru) => {
                        log::debug!("Evicting least recently used cache entry {lru}");
                        store.entries.remove(&lru);
                    }
                    None => break,
                }
            }
        }

        store.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                last_access: now,
            },
        );
    }

    /// Fetch a live entry or compute, store and return a new one
    pub fn get_or_insert_with<F>(&self, key: &str, factory: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(key) {
            return value;
        }
        let value = factory();
        self.set(key, value.clone());
        value
    }

    /// Remove a single entry, returning whether it existed
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        let mut store = self.lock();
        store.entries.clear();
        store.hits = 0;
        store.misses = 0;
    }

    /// Number of stored entries, expired ones included until they are swept
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let store = self.lock();
        let now = Instant::now();
        let expired_items = store
            .entries
            .values()
            .filter(|entry| now - entry.stored_at > self.ttl)
            .count();
        let total_items = store.entries.len();
        let lookups = store.hits + store.misses;

        CacheStats {
            total_items,
            expired_items,
            valid_items: total_items - expired_items,
            max_size: self.max_size,
            ttl_seconds: self.ttl.as_secs(),
            hits: store.hits,
            misses: store.misses,
            hit_ratio: if lookups == 0 {
                0.0
            } else {
                store.hits as f64 / lookups as f64
            },
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store<V>> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }
}
