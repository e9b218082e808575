//! th-cache: the in-memory translation cache (§4.5).
//!
//! Keyed by `fingerprint` (`th_core::fingerprint`). Bounded to `maxsize`
//! entries with LRU eviction and a per-entry TTL. Process-local; the
//! Persistence Handler remains the source of truth.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct CachedTranslation {
    pub translated_text: String,
    pub engine: String,
    pub engine_version: String,
    pub stored_at: Instant,
}

struct Entry {
    value: CachedTranslation,
    expires_at: Instant,
    last_used: u64,
}

pub struct TranslationCache {
    maxsize: usize,
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
    clock: std::sync::atomic::AtomicU64,
}

impl TranslationCache {
    pub fn new(maxsize: usize, ttl: Duration) -> Self {
        Self { maxsize, ttl, entries: Mutex::new(HashMap::new()), clock: std::sync::atomic::AtomicU64::new(0) }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }

    /// Returns the cached translation for `fingerprint`, refreshing its LRU
    /// recency, or `None` on a miss (including an expired entry, which is
    /// evicted lazily).
    pub async fn get(&self, fingerprint: &str) -> Option<CachedTranslation> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let expired = matches!(entries.get(fingerprint), Some(e) if e.expires_at <= now);
        if expired {
            entries.remove(fingerprint);
            return None;
        }
        let tick = self.tick();
        if let Some(entry) = entries.get_mut(fingerprint) {
            entry.last_used = tick;
            return Some(entry.value.clone());
        }
        None
    }

    /// Inserts a freshly translated result. Only called on a successful
    /// engine translation, never for a cache hit (§4.5).
    pub async fn put(&self, fingerprint: String, value: CachedTranslation) {
        if self.maxsize == 0 {
            return;
        }
        let mut entries = self.entries.lock().await;
        let tick = self.tick();
        let expires_at = Instant::now() + self.ttl;
        entries.insert(fingerprint, Entry { value, expires_at, last_used: tick });

        while entries.len() > self.maxsize {
            if let Some(lru_key) = entries.iter().min_by_key(|(_, e)| e.last_used).map(|(k, _)| k.clone()) {
                entries.remove(&lru_key);
                trace!(fingerprint = %lru_key, "evicted least-recently-used cache entry");
            } else {
                break;
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
