//! Cache layer
//!
//! A process-local moka cache for computed results such as
//! recommendations and analytics. Entries expire after the configured TTL.
//! Recommendation entries are also dropped by key prefix when the user's
//! profile, enrollments or applications change.

pub mod memory;

pub use memory::MemoryCache;

use crate::config::CacheConfig;
use std::sync::Arc;
use std::time::Duration;

pub type SharedCache = Arc<MemoryCache>;

pub fn create_cache(config: &CacheConfig) -> SharedCache {
    let ttl = Duration::from_secs(config.ttl_seconds.max(1));
    tracing::info!(ttl_seconds = ttl.as_secs(), max_capacity = config.max_capacity, "Cache initialized");
    Arc::new(MemoryCache::new(config.max_capacity, ttl))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_cache_uses_config() {
        let config = CacheConfig {
            ttl_seconds: 30,
            max_capacity: 10,
        };
        let cache = create_cache(&config);
        assert_eq!(cache.default_ttl(), Duration::from_secs(30));

        cache.set("k", &"v", cache.default_ttl()).await.unwrap();
        assert_eq!(cache.get::<String>("k").await.unwrap().as_deref(), Some("v"));
    }
}
