//! Cache contract and its backend implementations.

use crate::error::Result;
use crate::fallback::Fallback;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

#[cfg(feature = "inmemory")]
pub mod inmemory;
#[cfg(feature = "sql")]
pub mod sql;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryBackend;
#[cfg(feature = "sql")]
pub use sql::{SqlBackend, SqlConfig};

/// Default time-to-live for entries written without an explicit TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(900);

/// A stored cache entry.
///
/// `value` is the codec-encoded payload; `expire_at` is in unix seconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: String,
    pub expire_at: i64,
}

impl Entry {
    /// Build an entry that expires `ttl` after `now`.
    pub fn new(key: impl Into<String>, value: String, now: i64, ttl: Duration) -> Self {
        Entry {
            key: key.into(),
            value,
            expire_at: expire_at(now, ttl),
        }
    }

    /// An entry is expired once `now` reaches `expire_at`.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expire_at <= now
    }
}

/// Absolute expiry for an entry written at `now`.
pub fn expire_at(now: i64, ttl: Duration) -> i64 {
    let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    now.saturating_add(seconds)
}

/// Trait for cache backend implementations.
///
/// Every backend stores encoded values under string keys with an absolute
/// expiry. Entries whose expiry has been reached are absent to every read and
/// are removed by the read that notices them.
///
/// **IMPORTANT:** All methods use `&self`. Backends keep their state behind
/// interior mutability so clones share one store.
///
/// **ASYNC:** All methods are async and must be awaited.
///
/// # Example
///
/// ```no_run
/// use relcache::backend::{Cache, InMemoryBackend};
/// use relcache::fallback::{Fallback, Supplied};
/// use std::time::Duration;
///
/// # async fn example() -> relcache::Result<()> {
/// let cache = InMemoryBackend::new();
///
/// cache.put("greeting", "hello".to_string(), None).await?;
/// assert!(cache.has("greeting").await?);
///
/// // Populate on miss with a 5 second TTL
/// let answer: Option<u32> = cache
///     .get_or(
///         "answer",
///         Fallback::supplier(|| Some(Supplied::Expiring(42, Duration::from_secs(5)))),
///     )
///     .await?;
/// assert_eq!(answer, Some(42));
/// # Ok(())
/// # }
/// ```
#[allow(async_fn_in_trait)]
pub trait Cache: Send + Sync + Clone {
    /// Retrieve and decode the value for `key`.
    ///
    /// On a hit with `ttl = Some(..)`, the entry's expiry is refreshed to
    /// `now + ttl` and the value is returned unchanged.
    ///
    /// On a miss (absent or expired) the `fallback` is resolved. A non-absent
    /// resolution is written with [`Cache::put`] and returned; otherwise
    /// nothing is written and `Ok(None)` is returned.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unavailable or the payload cannot be
    /// decoded as `T`.
    async fn get_with<T>(
        &self,
        key: &str,
        fallback: Fallback<T>,
        ttl: Option<Duration>,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send;

    /// Store `value` under `key` with expiry `now + (ttl or default)`,
    /// replacing any existing entry. Returns the value unchanged.
    ///
    /// # Errors
    /// Returns `Err` if encoding fails or the backend is unavailable.
    async fn put<T>(&self, key: &str, value: T, ttl: Option<Duration>) -> Result<T>
    where
        T: Serialize + Send;

    /// Remove the entry for `key`. Missing keys are not an error.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unavailable.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove expired entries (`expired_only = true`) or every entry.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unavailable.
    async fn flush(&self, expired_only: bool) -> Result<()>;

    /// Retrieve without fallback or TTL refresh.
    ///
    /// # Errors
    /// See [`Cache::get_with`].
    async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        self.get_with(key, Fallback::Absent, None).await
    }

    /// Retrieve, populating from `fallback` on a miss.
    ///
    /// # Errors
    /// See [`Cache::get_with`].
    async fn get_or<T>(&self, key: &str, fallback: Fallback<T>) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        self.get_with(key, fallback, None).await
    }

    /// Check whether a live entry exists for `key`.
    ///
    /// Goes through [`Cache::get`], so an expired entry is evicted here too.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unavailable.
    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get::<Probe>(key).await?.is_some())
    }
}

/// Decodes any payload without materializing it.
struct Probe;

impl<'de> Deserialize<'de> for Probe {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        IgnoredAny::deserialize(deserializer).map(|_| Probe)
    }
}

impl Serialize for Probe {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_expiry_boundary() {
        let entry = Entry::new("k", "\"v\"".to_string(), 1_000, Duration::from_secs(10));
        assert_eq!(entry.expire_at, 1_010);
        assert!(!entry.is_expired(1_009));
        assert!(entry.is_expired(1_010));
        assert!(entry.is_expired(1_011));
    }

    #[test]
    fn test_expire_at_saturates() {
        assert_eq!(expire_at(i64::MAX - 1, Duration::from_secs(10)), i64::MAX);
        assert_eq!(expire_at(5, Duration::MAX), i64::MAX);
    }

    #[cfg(feature = "inmemory")]
    #[tokio::test]
    async fn test_has_follows_get() {
        let backend = InMemoryBackend::new();
        backend
            .put("key", vec![1, 2, 3], None)
            .await
            .expect("Failed to put key");
        assert!(backend.has("key").await.expect("Failed to check has"));
        assert!(!backend
            .has("nonexistent")
            .await
            .expect("Failed to check has"));
    }
}
