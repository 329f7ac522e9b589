//! In-process hot cache — an LRU map with per-entry TTL, fronting
//! the durable store for both landmark results and request status.
//!
//! Two independently-sized namespaces live behind one cache type:
//! `landmarks` keyed by the canonical `(lat, lng, radius)` string, and
//! `requests` keyed by request id. Expiration is lazy: a stale entry is
//! only evicted when it is next looked up, never by a background sweep.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct CachedValue {
    payload: Vec<u8>,
    inserted_at: Instant,
    ttl: Duration,
}

impl CachedValue {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

#[derive(Debug, Default)]
pub struct HotCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub expired: AtomicU64,
}

impl HotCacheStats {
    pub fn snapshot(&self) -> HotCacheStatsSnapshot {
        HotCacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotCacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired: u64,
}

/// A single LRU+TTL namespace, shared cheaply via `Arc` clones.
#[derive(Clone)]
pub struct HotCache {
    inner: Arc<RwLock<LruCache<String, CachedValue>>>,
    stats: Arc<HotCacheStats>,
    ttl: Duration,
}

impl HotCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity must be non-zero");
        Self {
            inner: Arc::new(RwLock::new(LruCache::new(capacity))),
            stats: Arc::new(HotCacheStats::default()),
            ttl,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut guard = self.inner.write().await;
        match guard.get(key) {
            Some(entry) if entry.is_expired() => {
                guard.pop(key);
                self.stats.expired.fetch_add(1, Ordering::Relaxed);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(entry) => {
                let value = serde_json::from_slice(&entry.payload).ok();
                if value.is_some() {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                }
                value
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: impl Into<String>, value: &T) {
        let Ok(payload) = serde_json::to_vec(value) else {
            return;
        };
        let entry = CachedValue {
            payload,
            inserted_at: Instant::now(),
            ttl: self.ttl,
        };
        let mut guard = self.inner.write().await;
        let was_full = guard.len() == guard.cap().get();
        let key = key.into();
        let evicted = guard.put(key, entry);
        if was_full && evicted.is_none() {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.write().await.pop(key);
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn stats(&self) -> HotCacheStatsSnapshot {
        self.stats.snapshot()
    }
}
