//! In-memory cache implementation using moka
//!
//! Values are stored as JSON strings so any serializable type fits. Each
//! entry carries its own TTL, capped by the cache-wide default.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default maximum cache capacity (number of entries)
const DEFAULT_MAX_CAPACITY: u64 = 1_000;

/// Default TTL for cache entries
const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Clone)]
struct CacheEntry {
    data: Arc<String>,
    ttl: Duration,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T, ttl: Duration) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
            ttl,
        })
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

/// Expiry policy reading the TTL stored on each entry
struct PerEntryTtl;

impl Expiry<String, CacheEntry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &CacheEntry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory cache using moka
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    default_ttl: Duration,
    /// Bumped by every `delete_pattern`
    generation: AtomicU64,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .field("generation", &self.generation())
            .finish()
    }
}

impl MemoryCache {
    /// Create a new memory cache with default settings
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, DEFAULT_TTL)
    }

    /// Create a new memory cache with custom capacity and default TTL
    pub fn with_capacity_and_ttl(max_capacity: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self {
            cache,
            default_ttl,
            generation: AtomicU64::new(0),
        }
    }

    /// Get the default TTL for this cache
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Invalidation counter
    ///
    /// A value computed after reading generation `g` is only current while
    /// the generation is still `g`. Stamp cached values with it to discard
    /// entries written back after a concurrent invalidation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Glob match where `*` is any run of characters and `?` exactly one
    pub(crate) fn pattern_matches(pattern: &str, key: &str) -> bool {
        let pattern: Vec<char> = pattern.chars().collect();
        let key: Vec<char> = key.chars().collect();

        let (mut pi, mut ki) = (0, 0);
        let mut backtrack: Option<(usize, usize)> = None;

        while ki < key.len() {
            match pattern.get(pi) {
                Some('*') => {
                    backtrack = Some((pi, ki));
                    pi += 1;
                }
                Some(&p) if p == '?' || p == key[ki] => {
                    pi += 1;
                    ki += 1;
                }
                _ => match backtrack {
                    Some((star_pi, star_ki)) => {
                        pi = star_pi + 1;
                        ki = star_ki + 1;
                        backtrack = Some((star_pi, star_ki + 1));
                    }
                    None => return false,
                },
            }
        }

        pattern[pi..].iter().all(|&c| c == '*')
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(entry.deserialize()?)),
            None => Ok(None),
        }
    }

    /// A TTL of zero or above the default falls back to the default
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let ttl = if ttl.is_zero() || ttl > self.default_ttl {
            self.default_ttl
        } else {
            ttl
        };
        let entry = CacheEntry::new(value, ttl)?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let keys_to_delete: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| Self::pattern_matches(pattern, key.as_ref()))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in keys_to_delete {
            self.cache.invalidate(&key).await;
        }

        Ok(())
    }
}
