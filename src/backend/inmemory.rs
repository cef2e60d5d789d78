//! In-memory cache backend (thread-safe, async).
//!
//! Uses DashMap for lock-free concurrent access with per-key sharding.
//! Expired entries are evicted by the read that observes them.

use super::{Cache, Entry, DEFAULT_TTL};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::fallback::Fallback;
use crate::serialization::{Codec, JsonCodec};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Thread-safe async in-memory cache backend.
///
/// Clones share the same map. Values are encoded with the configured
/// [`Codec`] so the in-memory and SQL backends store identical payloads.
///
/// # Example
///
/// ```no_run
/// use relcache::backend::{Cache, InMemoryBackend};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new().with_ttl(Duration::from_secs(60));
///
///     backend.put("key1", "value".to_string(), None).await?;
///
///     let value: Option<String> = backend.get("key1").await?;
///     assert_eq!(value.as_deref(), Some("value"));
///
///     // Store with a TTL of its own
///     backend.put("key2", 7u32, Some(Duration::from_secs(300))).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct InMemoryBackend<C: Codec = JsonCodec> {
    store: Arc<DashMap<String, Entry>>,
    codec: C,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl InMemoryBackend {
    /// Create a new in-memory cache backend with the default TTL.
    pub fn new() -> Self {
        InMemoryBackend {
            store: Arc::new(DashMap::new()),
            codec: JsonCodec,
            clock: Arc::new(SystemClock),
            ttl: DEFAULT_TTL,
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> InMemoryBackend<C> {
    /// Set the default TTL used when a write does not pass one.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Replace the value codec.
    pub fn with_codec<D: Codec>(self, codec: D) -> InMemoryBackend<D> {
        InMemoryBackend {
            store: self.store,
            codec,
            clock: self.clock,
            ttl: self.ttl,
        }
    }

    /// Default TTL for writes.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get the current number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Raw entry lookup, ignoring expiry and leaving the map untouched.
    pub fn entry(&self, key: &str) -> Option<Entry> {
        self.store.get(key).map(|entry| entry.value().clone())
    }

    /// Get memory statistics.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let total_bytes: usize = self
            .store
            .iter()
            .map(|entry| entry.key.len() + entry.value.len())
            .sum();
        let expired_count = self
            .store
            .iter()
            .filter(|entry| entry.is_expired(now))
            .count();

        CacheStats {
            total_entries: self.store.len(),
            expired_entries: expired_count,
            total_bytes,
        }
    }

    /// Print cache statistics to debug log.
    pub fn log_stats(&self) {
        let stats = self.stats();
        debug!(
            "Cache Stats: {} entries ({} expired), {} bytes",
            stats.total_entries, stats.expired_entries, stats.total_bytes
        );
    }
}

impl<C: Codec> Cache for InMemoryBackend<C> {
    async fn get_with<T>(
        &self,
        key: &str,
        fallback: Fallback<T>,
        ttl: Option<Duration>,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        let now = self.clock.now();
        let stored = self.store.get(key).map(|entry| entry.value().clone());

        match stored {
            Some(entry) if !entry.is_expired(now) => {
                debug!("✓ InMemory GET {} -> HIT", key);
                if let Some(ttl) = ttl {
                    let refreshed = Entry::new(key, entry.value.clone(), now, ttl);
                    self.store.insert(key.to_string(), refreshed);
                    debug!("✓ InMemory TOUCH {} (TTL: {:?})", key, ttl);
                }
                return self.codec.decode(&entry.value).map(Some);
            }
            Some(_) => {
                self.store.remove_if(key, |_, entry| entry.is_expired(now));
                debug!("✓ InMemory GET {} -> EXPIRED", key);
            }
            None => debug!("✓ InMemory GET {} -> MISS", key),
        }

        match fallback.resolve(self.ttl) {
            Some((value, ttl)) => self.put(key, value, Some(ttl)).await.map(Some),
            None => Ok(None),
        }
    }

    async fn put<T>(&self, key: &str, value: T, ttl: Option<Duration>) -> Result<T>
    where
        T: Serialize + Send,
    {
        let payload = self.codec.encode(&value)?;
        let ttl = ttl.unwrap_or(self.ttl);
        let entry = Entry::new(key, payload, self.clock.now(), ttl);
        self.store.insert(key.to_string(), entry);

        debug!("✓ InMemory PUT {} (TTL: {:?})", key, ttl);
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        debug!("✓ InMemory DELETE {}", key);
        Ok(())
    }

    async fn flush(&self, expired_only: bool) -> Result<()> {
        if expired_only {
            let now = self.clock.now();
            self.store.retain(|_, entry| !entry.is_expired(now));
            debug!("✓ InMemory FLUSH expired entries");
        } else {
            self.store.clear();
            warn!("⚠ InMemory FLUSH executed - all cache cleared!");
        }
        Ok(())
    }
}

/// Cache statistics.
#[derive(Clone, Debug)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub total_bytes: usize,
}
