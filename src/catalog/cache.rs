//! Key/value cache seam with TTL and prefix invalidation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use crate::Result;

#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    /// Removes every key starting with `prefix`.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<()>;
}

/// Used when no cache is reachable: every read misses, every write is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCache;

#[async_trait]
impl CacheLayer for DisabledCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> { Ok(None) }
    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> { Ok(()) }
    async fn delete(&self, _key: &str) -> Result<()> { Ok(()) }
    async fn delete_by_prefix(&self, _prefix: &str) -> Result<()> { Ok(()) }
}

/// Process-local cache. Expired entries are treated as absent on read.
#[derive(Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl InMemoryCache {
    pub fn new() -> Self { Self::default() }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.get(key).is_some_and(|(_, expires)| *expires > Instant::now())
    }

    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<_> = self.entries.read().await.iter()
            .filter(|(_, (_, expires))| *expires > now)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl CacheLayer for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        Ok(self.entries.read().await.get(key).filter(|(_, expires)| *expires > now).map(|(v, _)| v.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<()> {
        self.entries.write().await.retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = InMemoryCache::new();
        cache.set("k", "v".into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_by_prefix() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("products:list::1:20", "a".into(), ttl).await.unwrap();
        cache.set("products:list:tools:2:20", "b".into(), ttl).await.unwrap();
        cache.set("products:p1", "c".into(), ttl).await.unwrap();
        cache.delete_by_prefix("products:list:").await.unwrap();
        assert_eq!(cache.keys().await, vec!["products:p1".to_string()]);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_misses() {
        let cache = DisabledCache;
        cache.set("k", "v".into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
