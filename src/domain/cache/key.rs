//! Cache key construction

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::domain::DomainError;

/// Namespaced cache key built from a serializable value.
///
/// `namespace:hash` where the hash covers the JSON form of the value, so equal
/// queries share an entry regardless of which run issued them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(namespace: &str, value: &impl Serialize) -> Result<Self, DomainError> {
        let json = serde_json::to_string(value)
            .map_err(|e| DomainError::cache(format!("Failed to serialize cache key: {}", e)))?;

        let mut hasher = DefaultHasher::new();
        json.hash(&mut hasher);

        Ok(Self(format!("{}:{:016x}", namespace, hasher.finish())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key belongs to `namespace`
    pub fn in_namespace(&self, namespace: &str) -> bool {
        self.0
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.starts_with(':'))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
