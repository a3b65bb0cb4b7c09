//! Cache layer
//!
//! In-process cache (moka) for hot read paths such as the ranked topic
//! sidebar that is rendered on every page.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mtg_blog::cache::{create_cache, CacheLayer};
//! use mtg_blog::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("key", &"value", Duration::from_secs(60)).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache layer trait
///
/// Generic methods keep this trait from being object safe; hold the concrete
/// [`MemoryCache`] behind an `Arc` instead.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    /// Delete all values matching a glob pattern (`*`, `?`)
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;
}

/// Shared cache handle
pub type Cache = Arc<MemoryCache>;

/// Every cached topic listing lives under this prefix
pub const TOPICS_PATTERN: &str = "topics:*";

/// Key for the ranked topic list of a given size
pub fn top_topics_key(limit: usize) -> String {
    format!("topics:top:{}", limit)
}

/// Create the cache described by the configuration
pub fn create_cache(config: &CacheConfig) -> Cache {
    Arc::new(MemoryCache::with_capacity_and_ttl(
        config.max_entries,
        Duration::from_secs(config.ttl_seconds),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_topics_key_matches_pattern() {
        let key = top_topics_key(5);
        assert_eq!(key, "topics:top:5");
        assert!(MemoryCache::pattern_matches(TOPICS_PATTERN, &key));
    }

    #[tokio::test]
    async fn test_create_cache_uses_configured_ttl() {
        let config = CacheConfig {
            ttl_seconds: 42,
            max_entries: 10,
        };
        let cache = create_cache(&config);
        assert_eq!(cache.default_ttl(), Duration::from_secs(42));

        cache.set("k", &1u32, cache.default_ttl()).await.unwrap();
        let value: Option<u32> = cache.get("k").await.unwrap();
        assert_eq!(value, Some(1));
    }
}
