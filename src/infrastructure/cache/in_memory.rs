//! In-memory cache implementation using moka

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache as MokaCache;

use crate::config::CacheConfig;
use crate::domain::DomainError;
use crate::domain::cache::Cache;

/// Cache entry stored in moka
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Serialized JSON value
    data: String,
    /// Expiration timestamp (millis since epoch)
    expires_at: i64,
}

/// Thread-safe in-memory cache with a TTL per entry.
///
/// moka bounds the capacity and applies a global ceiling TTL; the per-entry
/// deadline is checked on read.
#[derive(Debug, Clone)]
pub struct InMemoryCache {
    cache: MokaCache<String, CacheEntry>,
}

impl InMemoryCache {
    pub fn new(max_capacity: u64, ceiling_ttl: Duration) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ceiling_ttl)
            .build();

        Self { cache }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        // entries never outlive ten default TTLs even if set with a longer one
        let ceiling = Duration::from_secs(config.ttl_secs.max(1).saturating_mul(10));
        Self::new(config.max_capacity, ceiling)
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn is_expired(entry: &CacheEntry) -> bool {
        Self::now_millis() >= entry.expires_at
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(10_000, Duration::from_secs(3600))
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        match self.cache.get(key).await {
            Some(entry) if Self::is_expired(&entry) => {
                self.cache.remove(key).await;
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.data)),
            None => Ok(None),
        }
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let entry = CacheEntry {
            data: value.to_string(),
            expires_at: Self::now_millis().saturating_add(ttl_millis),
        };

        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.cache.remove(key).await.is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, DomainError> {
        self.cache.run_pending_tasks().await;

        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.as_ref().clone())
            .collect();

        for key in &keys {
            self.cache.remove(key).await;
        }

        Ok(keys.len())
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }

    async fn size(&self) -> Result<usize, DomainError> {
        self.cache.run_pending_tasks().await;
        Ok(self.cache.entry_count() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheExt;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = InMemoryCache::default();

        cache.set("k", &vec![1, 2, 3], Duration::from_secs(60)).await.unwrap();

        let value: Option<Vec<i32>> = cache.get("k").await.unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_entry_expires_after_its_ttl() {
        let cache = InMemoryCache::default();

        cache.set_raw("short", "\"v\"", Duration::from_millis(20)).await.unwrap();
        cache.set_raw("long", "\"v\"", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get_raw("short").await.unwrap(), None);
        assert!(cache.get_raw("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_prefix_only_touches_namespace() {
        let cache = InMemoryCache::default();
        let ttl = Duration::from_secs(60);

        cache.set_raw("observation:posts:1", "1", ttl).await.unwrap();
        cache.set_raw("observation:posts:2", "2", ttl).await.unwrap();
        cache.set_raw("observation:communities:1", "3", ttl).await.unwrap();

        let removed = cache.delete_prefix("observation:posts:").await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(cache.size().await.unwrap(), 1);
        assert!(cache.get_raw("observation:communities:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let cache = InMemoryCache::default();
        let ttl = Duration::from_secs(60);

        cache.set_raw("a", "1", ttl).await.unwrap();
        cache.set_raw("b", "2", ttl).await.unwrap();

        assert!(cache.delete("a").await.unwrap());
        assert!(!cache.delete("a").await.unwrap());

        cache.clear().await.unwrap();
        assert_eq!(cache.size().await.unwrap(), 0);
    }
}
