//! Cache configuration.
//!
//! Controls the backend, expiration policy and miss handling via `lectern.toml`.

use std::{num::NonZeroUsize, str::FromStr, time::Duration};

use super::keys::{CacheKey, KeySpace};

// Default values for cache configuration
pub(crate) const DEFAULT_CACHE_URL: &str = "redis://127.0.0.1:6379";
pub(crate) const DEFAULT_LIST_TTL_SECS: u64 = 60;
pub(crate) const DEFAULT_ITEM_TTL_SECS: u64 = 110;
pub(crate) const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 250;
pub(crate) const DEFAULT_MEMORY_CAPACITY: usize = 1024;

/// Which cache backend serves `get`/`set`/`expire`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// External Redis/Valkey server shared between processes.
    Redis,
    /// Process-local LRU with expiry, for single-node deployments and tests.
    Memory,
}

impl CacheBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBackend::Redis => "redis",
            CacheBackend::Memory => "memory",
        }
    }
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" | "valkey" => Ok(CacheBackend::Redis),
            "memory" => Ok(CacheBackend::Memory),
            other => Err(format!(
                "unknown cache backend `{other}` (expected `redis` or `memory`)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false every lookup misses and nothing is written.
    pub enabled: bool,
    pub backend: CacheBackend,
    /// Connection URL for the Redis backend.
    pub url: String,
    /// Namespace prepended to every key.
    pub key_prefix: String,
    /// Lifetime of the `articles_all` entry.
    pub list_ttl: Duration,
    /// Lifetime of `article:<id>` entries.
    pub item_ttl: Duration,
    /// Upper bound on a single backend command.
    pub operation_timeout: Duration,
    /// Maximum entries held by the memory backend.
    pub memory_capacity: NonZeroUsize,
    /// Share one store fetch between concurrent misses on the same key.
    pub coalesce_misses: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Redis,
            url: DEFAULT_CACHE_URL.to_string(),
            key_prefix: String::new(),
            list_ttl: Duration::from_secs(DEFAULT_LIST_TTL_SECS),
            item_ttl: Duration::from_secs(DEFAULT_ITEM_TTL_SECS),
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
            memory_capacity: NonZeroUsize::new(DEFAULT_MEMORY_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            coalesce_misses: false,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            backend: settings.backend,
            url: settings.url.clone(),
            key_prefix: settings.key_prefix.clone(),
            list_ttl: settings.list_ttl,
            item_ttl: settings.item_ttl,
            operation_timeout: settings.operation_timeout,
            memory_capacity: settings.memory_capacity,
            coalesce_misses: settings.coalesce_misses,
        }
    }
}

impl CacheConfig {
    /// Expiration applied when `key` is populated.
    pub fn ttl_for(&self, key: CacheKey) -> Duration {
        match key {
            CacheKey::AllArticles => self.list_ttl,
            CacheKey::Article(_) => self.item_ttl,
        }
    }

    pub fn key_space(&self) -> KeySpace {
        KeySpace::new(self.key_prefix.clone())
    }

    /// True when the listing would outlive the items it aggregates.
    pub fn list_outlives_items(&self) -> bool {
        self.list_ttl >= self.item_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.backend, CacheBackend::Redis);
        assert_eq!(config.url, "redis://127.0.0.1:6379");
        assert_eq!(config.list_ttl, Duration::from_secs(60));
        assert_eq!(config.item_ttl, Duration::from_secs(110));
        assert_eq!(config.memory_capacity.get(), 1024);
        assert!(!config.coalesce_misses);
    }

    #[test]
    fn list_entries_expire_sooner_by_default() {
        let config = CacheConfig::default();
        assert!(config.ttl_for(CacheKey::AllArticles) < config.ttl_for(CacheKey::Article(1)));
        assert!(!config.list_outlives_items());
    }

    #[test]
    fn ttl_policy_is_tunable() {
        let config = CacheConfig {
            list_ttl: Duration::from_secs(5),
            item_ttl: Duration::from_secs(900),
            ..Default::default()
        };
        assert_eq!(config.ttl_for(CacheKey::AllArticles), Duration::from_secs(5));
        assert_eq!(config.ttl_for(CacheKey::Article(9)), Duration::from_secs(900));
    }

    #[test]
    fn backend_parsing_accepts_known_names() {
        assert_eq!("Redis".parse::<CacheBackend>(), Ok(CacheBackend::Redis));
        assert_eq!("valkey".parse::<CacheBackend>(), Ok(CacheBackend::Redis));
        assert_eq!(" memory ".parse::<CacheBackend>(), Ok(CacheBackend::Memory));
        assert!("memcached".parse::<CacheBackend>().is_err());
    }
}
