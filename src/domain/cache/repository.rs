//! Cache trait definition

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::domain::DomainError;

/// Key-value cache with an explicit TTL per entry
///
/// Values are JSON strings so the trait stays dyn-compatible; use
/// [`CacheExt`] for typed access.
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError>;

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError>;

    /// Returns whether the key existed
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Deletes every key starting with `prefix`, returning the count
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, DomainError>;

    async fn clear(&self) -> Result<(), DomainError>;

    /// Approximate number of live entries
    async fn size(&self) -> Result<usize, DomainError>;
}

/// Typed get/set on top of [`Cache`]
pub trait CacheExt: Cache {
    fn get<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            match self.get_raw(key).await? {
                Some(data) => {
                    let value: V = serde_json::from_str(&data).map_err(|e| {
                        DomainError::cache(format!("Failed to deserialize cache value: {}", e))
                    })?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        }
    }

    fn set<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let data = serde_json::to_string(value).map_err(|e| {
                DomainError::cache(format!("Failed to serialize cache value: {}", e))
            })?;
            self.set_raw(key, &data, ttl).await
        }
    }
}

impl<T: Cache + ?Sized> CacheExt for T {}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock cache for testing
    #[derive(Debug, Default)]
    pub struct MockCache {
        entries: Mutex<HashMap<String, (String, Duration)>>,
        error: Mutex<Option<String>>,
    }

    impl MockCache {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_error(self, error: impl Into<String>) -> Self {
            *self.error.lock().unwrap() = Some(error.into());
            self
        }

        pub fn ttl_of(&self, key: &str) -> Option<Duration> {
            self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
        }

        fn check_error(&self) -> Result<(), DomainError> {
            if let Some(error) = self.error.lock().unwrap().clone() {
                return Err(DomainError::cache(error));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Cache for MockCache {
        async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
            self.check_error()?;
            Ok(self
                .entries
                .lock()
                .unwrap()
                .get(key)
                .map(|(json, _)| json.clone()))
        }

        async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
            self.check_error()?;
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), ttl));
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<bool, DomainError> {
            self.check_error()?;
            Ok(self.entries.lock().unwrap().remove(key).is_some())
        }

        async fn delete_prefix(&self, prefix: &str) -> Result<usize, DomainError> {
            self.check_error()?;
            let mut entries = self.entries.lock().unwrap();
            let before = entries.len();
            entries.retain(|k, _| !k.starts_with(prefix));
            Ok(before - entries.len())
        }

        async fn clear(&self) -> Result<(), DomainError> {
            self.check_error()?;
            self.entries.lock().unwrap().clear();
            Ok(())
        }

        async fn size(&self) -> Result<usize, DomainError> {
            self.check_error()?;
            Ok(self.entries.lock().unwrap().len())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_cache_typed_round_trip() {
            let cache = MockCache::new();
            cache
                .set("key1", &vec![1, 2, 3], Duration::from_secs(60))
                .await
                .unwrap();

            let result: Option<Vec<i32>> = cache.get("key1").await.unwrap();
            assert_eq!(result, Some(vec![1, 2, 3]));
            assert_eq!(cache.ttl_of("key1"), Some(Duration::from_secs(60)));
        }

        #[tokio::test]
        async fn test_mock_cache_delete_prefix() {
            let cache = MockCache::new();
            let ttl = Duration::from_secs(60);
            cache.set_raw("observation:posts:1", "1", ttl).await.unwrap();
            cache.set_raw("observation:posts:2", "2", ttl).await.unwrap();
            cache.set_raw("other:key", "3", ttl).await.unwrap();

            assert_eq!(cache.delete_prefix("observation:posts").await.unwrap(), 2);
            assert_eq!(cache.size().await.unwrap(), 1);
        }

        #[tokio::test]
        async fn test_mock_cache_with_error() {
            let cache = MockCache::new().with_error("Test error");
            let result: Result<Option<String>, _> = cache.get("key").await;
            assert!(result.is_err());
        }
    }
}
