//! In-memory cache backed by moka
//!
//! Values are stored as JSON so one cache can hold any serializable type.
//! Each entry carries its own TTL.

use anyhow::{Context, Result};
use moka::future::Cache;
use moka::Expiry;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

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

pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl MemoryCache {
    pub fn new(max_capacity: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .support_invalidation_closures()
            .build();
        Self { cache, default_ttl }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(entry.deserialize()?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(value, ttl)?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    /// Drop every entry whose key starts with `prefix`
    pub fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let prefix = prefix.to_string();
        self.cache
            .invalidate_entries_if(move |key, _| key.starts_with(&prefix))
            .map_err(|e| anyhow::anyhow!("Failed to invalidate cache entries: {}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: i64,
        score: f64,
    }

    fn cache() -> MemoryCache {
        MemoryCache::new(100, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_set_get_overwrite() {
        let cache = cache();
        let items = vec![Item { id: 1, score: 2.5 }];
        cache.set("rec:1:courses", &items, Duration::from_secs(60)).await.unwrap();

        let hit: Option<Vec<Item>> = cache.get("rec:1:courses").await.unwrap();
        assert_eq!(hit, Some(items));

        let fresh = vec![Item { id: 2, score: 1.0 }];
        cache.set("rec:1:courses", &fresh, Duration::from_secs(60)).await.unwrap();
        let hit: Option<Vec<Item>> = cache.get("rec:1:courses").await.unwrap();
        assert_eq!(hit, Some(fresh));

        let miss: Option<Vec<Item>> = cache.get("rec:2:courses").await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = cache();
        cache.set("short", &1_i64, Duration::from_millis(50)).await.unwrap();
        cache.set("long", &2_i64, Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(cache.get::<i64>("short").await.unwrap(), None);
        assert_eq!(cache.get::<i64>("long").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_delete_prefix() {
        let cache = cache();
        let ttl = Duration::from_secs(60);
        cache.set("rec:1:jobs", &1_i64, ttl).await.unwrap();
        cache.set("rec:1:courses", &2_i64, ttl).await.unwrap();
        cache.set("rec:2:jobs", &3_i64, ttl).await.unwrap();

        cache.delete_prefix("rec:1:").unwrap();
        // invalidation closures run lazily; reads check them
        assert_eq!(cache.get::<i64>("rec:1:jobs").await.unwrap(), None);
        assert_eq!(cache.get::<i64>("rec:1:courses").await.unwrap(), None);
        assert_eq!(cache.get::<i64>("rec:2:jobs").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_wrong_type_is_an_error() {
        let cache = cache();
        cache.set("k", &"text", Duration::from_secs(60)).await.unwrap();
        assert!(cache.get::<Item>("k").await.is_err());
    }
}
