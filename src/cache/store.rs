//! Cache storage contract and in-process implementations.
//!
//! The cache is a soft dependency: every operation may fail and callers are
//! expected to degrade to the content store rather than fail a request.

use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use lru::LruCache;
use thiserror::Error;
use tokio::time::Instant;

use super::config::CacheConfig;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("cache backend unavailable")]
    Unavailable,
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// String-keyed get/set/expire over an external cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend name used in logs and metrics.
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key` without an expiration.
    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Store `value` and bound its lifetime to `ttl`.
    ///
    /// Backends with an atomic primitive should override this so an entry is
    /// never observable without its expiration.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.set(key, value).await?;
        self.expire(key, ttl).await
    }

    /// Round-trip to the backend, used by the health route.
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Backend used when caching is switched off or could not be reached at
/// startup. Reads always miss; writes always fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCache;

#[async_trait]
impl CacheStore for DisabledCache {
    fn backend(&self) -> &'static str {
        "disabled"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), CacheError> {
        Err(CacheError::Unavailable)
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Err(CacheError::Unavailable)
    }
}

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Process-local cache with LRU eviction and lazy expiry.
///
/// Mirrors Redis semantics for the subset we use: `set` clears any previous
/// expiration, `expire` on a missing key is a no-op.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.memory_capacity)),
        }
    }

    /// Number of stored entries, including ones that expired but were not yet read.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` currently holds a live entry, without touching LRU order.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        mutex_lock(&self.entries, SOURCE, "contains")
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Remaining lifetime of `key`, if it exists and has an expiration.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        mutex_lock(&self.entries, SOURCE, "ttl")
            .peek(key)
            .and_then(|entry| entry.expires_at)
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

/// Deadline `ttl` from now. A TTL past the clock's range never expires.
fn deadline_after(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl)
}

#[async_trait]
impl CacheStore for MemoryCache {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        entries.pop(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        mutex_lock(&self.entries, SOURCE, "set").put(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let deadline = deadline_after(ttl);
        if let Some(entry) = mutex_lock(&self.entries, SOURCE, "expire").peek_mut(key) {
            entry.expires_at = deadline;
        }
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let deadline = deadline_after(ttl);
        mutex_lock(&self.entries, SOURCE, "set_with_ttl").put(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: deadline,
            },
        );
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
