//! Redis-backed cache store.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use redis::{AsyncCommands, Client, RedisResult, aio::ConnectionManager};
use tracing::info;

use crate::cache::{CacheConfig, CacheError, CacheStore};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared connection to a Redis (or Valkey) server.
///
/// Every command is bounded by the configured operation timeout so a slow
/// cache never holds a request longer than that.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    operation_timeout: Duration,
}

impl RedisCache {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.url.as_str()).map_err(CacheError::backend)?;
        let connection = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Timeout(CONNECT_TIMEOUT))?
            .map_err(CacheError::backend)?;

        let cache = Self {
            connection,
            operation_timeout: config.operation_timeout,
        };
        cache.ping().await?;

        info!(
            target = "lectern::cache",
            backend = "redis",
            "connected to cache server"
        );
        Ok(cache)
    }

    async fn bounded<T, F>(&self, command: F) -> Result<T, CacheError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        tokio::time::timeout(self.operation_timeout, command)
            .await
            .map_err(|_| CacheError::Timeout(self.operation_timeout))?
            .map_err(CacheError::backend)
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl CacheStore for RedisCache {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        self.bounded(conn.get::<_, Option<String>>(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        self.bounded(conn.set::<_, _, ()>(key, value)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let millis = i64::try_from(ttl_millis(ttl)).unwrap_or(i64::MAX);
        self.bounded(conn.pexpire::<_, ()>(key, millis)).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        self.bounded(conn.pset_ex::<_, _, ()>(key, value, ttl_millis(ttl)))
            .await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        self.bounded(redis::cmd("PING").query_async::<()>(&mut conn))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_is_never_rounded_to_zero() {
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(110)), 110_000);
    }

    #[tokio::test]
    async fn connect_fails_for_malformed_url() {
        let config = CacheConfig {
            url: "not a url".into(),
            ..Default::default()
        };
        assert!(matches!(
            RedisCache::connect(&config).await,
            Err(CacheError::Backend(_))
        ));
    }
}
