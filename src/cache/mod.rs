//! Cache layer
//!
//! Read-heavy public data (category list, active breaking news) is cached in
//! process with moka. Setting `cache.driver: none` turns every operation into
//! a miss/no-op.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheConfig, CacheDriver};

pub use memory::MemoryCache;

/// Cache layer trait
///
/// The generic methods keep this trait from being object safe; use the
/// [`Cache`] enum for runtime selection.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key starting with `prefix`
    async fn delete_prefix(&self, prefix: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

#[derive(Debug)]
pub enum Cache {
    Memory(MemoryCache),
    Disabled,
}

impl Cache {
    /// TTL applied by services caching on behalf of the public API
    pub fn default_ttl(&self) -> Duration {
        match self {
            Cache::Memory(cache) => cache.default_ttl(),
            Cache::Disabled => Duration::ZERO,
        }
    }

    /// Read a cached value; a failed read counts as a miss
    pub async fn lookup<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        match self.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("Cache read for {} failed: {:#}", key, e);
                None
            }
        }
    }

    /// Store a value under the default TTL; failures are logged and dropped
    pub async fn remember<T: Serialize + Send + Sync>(&self, key: &str, value: &T) {
        if let Err(e) = self.set(key, value, self.default_ttl()).await {
            tracing::warn!("Failed to cache {}: {:#}", key, e);
        }
    }
}

#[async_trait]
impl CacheLayer for Cache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self {
            Cache::Memory(cache) => cache.get(key).await,
            Cache::Disabled => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.set(key, value, ttl).await,
            Cache::Disabled => Ok(()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.delete(key).await,
            Cache::Disabled => Ok(()),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.delete_prefix(prefix).await,
            Cache::Disabled => Ok(()),
        }
    }

    async fn clear(&self) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.clear().await,
            Cache::Disabled => Ok(()),
        }
    }
}

/// Create the cache selected by configuration
pub fn create_cache(config: &CacheConfig) -> Arc<Cache> {
    match config.driver {
        CacheDriver::Memory => Arc::new(Cache::Memory(MemoryCache::with_ttl(Duration::from_secs(
            config.ttl_seconds,
        )))),
        CacheDriver::None => Arc::new(Cache::Disabled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_memory_cache() {
        let cache = create_cache(&CacheConfig::default());
        cache
            .set("key", &"value".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        let result: Option<String> = cache.get("key").await.unwrap();
        assert_eq!(result, Some("value".to_string()));
        assert_eq!(cache.default_ttl(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_disabled_cache_never_hits() {
        let config = CacheConfig {
            driver: CacheDriver::None,
            ttl_seconds: 60,
        };
        let cache = create_cache(&config);
        cache.set("key", &1, Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get::<i32>("key").await.unwrap(), None);
        cache.delete_prefix("k").await.unwrap();
        cache.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_lookup_treats_unreadable_entry_as_miss() {
        let cache = create_cache(&CacheConfig::default());
        cache.remember("categories:list", &"not a list").await;

        assert!(cache.lookup::<Vec<i64>>("categories:list").await.is_none());
        assert_eq!(
            cache.lookup::<String>("categories:list").await.as_deref(),
            Some("not a list")
        );
    }
}
