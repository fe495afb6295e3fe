//! Cache-aside view over the catalog store.
//!
//! Reads try the cache first and fill it on a miss. Writes go to the store
//! first; only after the store accepts them are `products:<id>` and every
//! `products:list:*` page dropped. Any write invalidates all list pages.
//!
//! Cache failures are logged and swallowed on both paths. A failed invalidation
//! leaves the committed write in place, so a read may serve stale data for at
//! most one TTL.
//!
//! Every write bumps a generation counter before invalidating. A read fills the
//! cache only if no write started since its store read, and drops its own entry
//! again if one started while the entry was being stored.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use crate::catalog::{CacheLayer, CatalogPage, CatalogStore, ListQuery};
use crate::domain::CatalogItem;
use crate::inventory::{StockDecrement, StockStore};
use crate::Result;

pub const LIST_KEY_PREFIX: &str = "products:list:";

pub fn list_key(query: &ListQuery) -> String {
    format!("{LIST_KEY_PREFIX}{}:{}:{}", query.category, query.page, query.page_size)
}

pub fn item_key(id: &str) -> String {
    format!("products:{id}")
}

pub struct CachingCatalogView<S> {
    store: Arc<S>,
    cache: Arc<dyn CacheLayer>,
    ttl: Duration,
    generation: AtomicU64,
}

impl<S: CatalogStore> CachingCatalogView<S> {
    pub fn new(store: Arc<S>, cache: Arc<dyn CacheLayer>, ttl: Duration) -> Self {
        Self { store, cache, ttl, generation: AtomicU64::new(0) }
    }

    pub fn store(&self) -> &Arc<S> { &self.store }

    pub async fn list(&self, query: &ListQuery) -> Result<CatalogPage> {
        let key = list_key(query);
        if let Some(page) = self.read_cached::<CatalogPage>(&key).await {
            tracing::debug!(key, "Catalog page served from cache");
            return Ok(page);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let page = self.store.list(query).await?;
        tracing::debug!(key, total = page.total, "Catalog page served from database");
        self.write_cached(&key, &page, generation).await;
        Ok(page)
    }

    pub async fn get(&self, id: &str) -> Result<Option<CatalogItem>> {
        let key = item_key(id);
        if let Some(item) = self.read_cached::<CatalogItem>(&key).await {
            return Ok(Some(item));
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let item = self.store.get(id).await?;
        if let Some(item) = &item {
            self.write_cached(&key, item, generation).await;
        }
        Ok(item)
    }

    pub async fn create(&self, item: &CatalogItem) -> Result<()> {
        self.store.create(item).await?;
        self.invalidate(None).await;
        Ok(())
    }

    pub async fn update(&self, item: &CatalogItem) -> Result<()> {
        self.store.update(item).await?;
        self.invalidate(Some(&item.id)).await;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id).await?;
        self.invalidate(Some(id)).await;
        Ok(())
    }

    async fn read_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed");
                None
            }
        }
    }

    async fn write_cached<T: Serialize>(&self, key: &str, value: &T, read_generation: u64) {
        if self.generation.load(Ordering::SeqCst) != read_generation {
            tracing::debug!(key, "Catalog changed during read, not caching");
            return;
        }
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to encode cache entry");
                return;
            }
        };
        if let Err(e) = self.cache.set(key, raw, self.ttl).await {
            tracing::warn!(key, error = %e, "Failed to cache entry");
            return;
        }
        if self.generation.load(Ordering::SeqCst) != read_generation {
            if let Err(e) = self.cache.delete(key).await {
                tracing::warn!(key, error = %e, "Failed to drop entry cached during a write");
            }
        }
    }

    /// Runs after a committed write: bumps the generation, then drops the
    /// item entry (when given) and every list page.
    async fn invalidate(&self, id: Option<&str>) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(id) = id {
            if let Err(e) = self.cache.delete(&item_key(id)).await {
                tracing::warn!(product_id = id, error = %e, "Failed to invalidate product cache");
            }
        }
        if let Err(e) = self.cache.delete_by_prefix(LIST_KEY_PREFIX).await {
            tracing::warn!(error = %e, "Failed to invalidate list cache");
        }
    }
}

/// Stock decrements routed through the view invalidate like any other write.
#[async_trait]
impl<S: CatalogStore> StockStore for CachingCatalogView<S> {
    async fn get(&self, id: &str) -> Result<Option<CatalogItem>> {
        self.store.get(id).await
    }

    async fn decrement_stock(&self, id: &str, quantity: u32) -> Result<StockDecrement> {
        let result = self.store.decrement_stock(id, quantity).await?;
        if matches!(result, StockDecrement::Applied { .. }) {
            self.invalidate(Some(id)).await;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCache;
    use crate::domain::Quantity;
    use crate::inventory::StockMutator;
    use crate::store::InMemoryCatalogStore;
    use crate::InventoryError;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use tokio::sync::Notify;

    /// Store wrapper counting list/get reads.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryCatalogStore,
        lists: AtomicUsize,
        gets: AtomicUsize,
    }

    #[async_trait]
    impl StockStore for CountingStore {
        async fn get(&self, id: &str) -> Result<Option<CatalogItem>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(id).await
        }
        async fn decrement_stock(&self, id: &str, quantity: u32) -> Result<StockDecrement> {
            self.inner.decrement_stock(id, quantity).await
        }
    }

    #[async_trait]
    impl CatalogStore for CountingStore {
        async fn create(&self, item: &CatalogItem) -> Result<()> { self.inner.create(item).await }
        async fn update(&self, item: &CatalogItem) -> Result<()> { self.inner.update(item).await }
        async fn delete(&self, id: &str) -> Result<()> { self.inner.delete(id).await }
        async fn list(&self, query: &ListQuery) -> Result<CatalogPage> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            self.inner.list(query).await
        }
    }

    /// Cache whose every operation fails.
    struct BrokenCache;

    #[async_trait]
    impl CacheLayer for BrokenCache {
        async fn get(&self, _: &str) -> Result<Option<String>> { Err(InventoryError::Cache("down".into())) }
        async fn set(&self, _: &str, _: String, _: Duration) -> Result<()> { Err(InventoryError::Cache("down".into())) }
        async fn delete(&self, _: &str) -> Result<()> { Err(InventoryError::Cache("down".into())) }
        async fn delete_by_prefix(&self, _: &str) -> Result<()> { Err(InventoryError::Cache("down".into())) }
    }

    const TTL: Duration = Duration::from_secs(300);

    async fn view() -> (CachingCatalogView<CountingStore>, Arc<CountingStore>, Arc<InMemoryCache>) {
        let store = Arc::new(CountingStore::default());
        store.inner.insert(CatalogItem::new("Hammer", Decimal::TEN, 5, "tools").with_id("p1")).await;
        store.inner.insert(CatalogItem::new("Rake", Decimal::TEN, 5, "garden").with_id("p2")).await;
        let cache = Arc::new(InMemoryCache::new());
        (CachingCatalogView::new(store.clone(), cache.clone(), TTL), store, cache)
    }

    #[test]
    fn test_key_format() {
        assert_eq!(list_key(&ListQuery::new("", 1, 20)), "products:list::1:20");
        assert_eq!(list_key(&ListQuery::new("tools", 2, 50)), "products:list:tools:2:50");
        assert_eq!(item_key("p1"), "products:p1");
    }

    #[tokio::test]
    async fn test_second_list_is_served_from_cache() {
        let (view, store, _) = view().await;
        let query = ListQuery::new("tools", 1, 20);
        let first = view.list(&query).await.unwrap();
        let second = view.list(&query).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.total, 1);
        assert_eq!(store.lists.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_any_write_invalidates_every_page() {
        let (view, store, cache) = view().await;
        let tools = ListQuery::new("tools", 1, 20);
        let all = ListQuery::new("", 1, 20);
        view.list(&tools).await.unwrap();
        view.list(&all).await.unwrap();
        assert_eq!(store.lists.load(Ordering::SeqCst), 2);

        view.create(&CatalogItem::new("Hoe", Decimal::TEN, 1, "garden")).await.unwrap();
        assert!(!cache.contains(&list_key(&tools)).await);

        let fresh = view.list(&all).await.unwrap();
        view.list(&tools).await.unwrap();
        assert_eq!(fresh.total, 3);
        assert_eq!(store.lists.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_update_and_delete_invalidate_item_entry() {
        let (view, store, cache) = view().await;
        let mut item = view.get("p1").await.unwrap().unwrap();
        view.get("p1").await.unwrap();
        assert_eq!(store.gets.load(Ordering::SeqCst), 1);

        item.name = "Claw Hammer".into();
        view.update(&item).await.unwrap();
        assert!(!cache.contains(&item_key("p1")).await);
        assert_eq!(view.get("p1").await.unwrap().unwrap().name, "Claw Hammer");

        view.delete("p1").await.unwrap();
        assert!(view.get("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_store_write_keeps_cache() {
        let (view, _, cache) = view().await;
        let query = ListQuery::default();
        view.list(&query).await.unwrap();
        let ghost = CatalogItem::new("Ghost", Decimal::ONE, 1, "").with_id("ghost");
        assert!(matches!(view.update(&ghost).await, Err(InventoryError::ProductNotFound(_))));
        assert!(cache.contains(&list_key(&query)).await);
    }

    #[tokio::test]
    async fn test_stock_decrement_through_view_invalidates() {
        let (view, store, cache) = view().await;
        let view = Arc::new(view);
        let query = ListQuery::default();
        view.list(&query).await.unwrap();
        view.get("p1").await.unwrap();

        StockMutator::new(view.clone()).decrease("p1", 2).await.unwrap();
        assert!(cache.keys().await.is_empty());
        assert_eq!(view.get("p1").await.unwrap().unwrap().stock, Quantity::new(3));
        view.list(&query).await.unwrap();
        assert_eq!(store.lists.load(Ordering::SeqCst), 2);

        // A rejected decrement is not a write.
        assert!(StockMutator::new(view.clone()).decrease("p1", 99).await.is_err());
        assert!(cache.contains(&list_key(&query)).await);
    }

    #[tokio::test]
    async fn test_cache_failures_are_swallowed() {
        let store = Arc::new(CountingStore::default());
        store.inner.insert(CatalogItem::new("Hammer", Decimal::TEN, 5, "tools").with_id("p1")).await;
        let view = CachingCatalogView::new(store.clone(), Arc::new(BrokenCache), TTL);

        assert_eq!(view.list(&ListQuery::default()).await.unwrap().total, 1);
        assert_eq!(view.list(&ListQuery::default()).await.unwrap().total, 1);
        assert_eq!(store.lists.load(Ordering::SeqCst), 2);

        let mut item = view.get("p1").await.unwrap().unwrap();
        item.stock = Quantity::new(9);
        view.update(&item).await.unwrap();
        view.delete("p1").await.unwrap();
        assert!(store.inner.get("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_undecodable_entry_falls_back_to_store() {
        let (view, store, cache) = view().await;
        let query = ListQuery::default();
        cache.set(&list_key(&query), "not json".into(), TTL).await.unwrap();
        assert_eq!(view.list(&query).await.unwrap().total, 2);
        assert_eq!(store.lists.load(Ordering::SeqCst), 1);
    }

    /// Store that parks the first list or get after its read until released.
    #[derive(Default)]
    struct GatedStore {
        inner: InMemoryCatalogStore,
        armed: AtomicBool,
        read_done: Notify,
        release: Notify,
    }

    impl GatedStore {
        async fn hold(&self) {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.read_done.notify_one();
                self.release.notified().await;
            }
        }
    }

    #[async_trait]
    impl StockStore for GatedStore {
        async fn get(&self, id: &str) -> Result<Option<CatalogItem>> {
            let item = self.inner.get(id).await;
            self.hold().await;
            item
        }
        async fn decrement_stock(&self, id: &str, quantity: u32) -> Result<StockDecrement> {
            self.inner.decrement_stock(id, quantity).await
        }
    }

    #[async_trait]
    impl CatalogStore for GatedStore {
        async fn create(&self, item: &CatalogItem) -> Result<()> { self.inner.create(item).await }
        async fn update(&self, item: &CatalogItem) -> Result<()> { self.inner.update(item).await }
        async fn delete(&self, id: &str) -> Result<()> { self.inner.delete(id).await }
        async fn list(&self, query: &ListQuery) -> Result<CatalogPage> {
            let page = self.inner.list(query).await;
            self.hold().await;
            page
        }
    }

    async fn gated_view() -> (Arc<CachingCatalogView<GatedStore>>, Arc<GatedStore>) {
        let store = Arc::new(GatedStore::default());
        store.inner.insert(CatalogItem::new("Hammer", Decimal::TEN, 5, "tools").with_id("p1")).await;
        store.armed.store(true, Ordering::SeqCst);
        (Arc::new(CachingCatalogView::new(store.clone(), Arc::new(InMemoryCache::new()), TTL)), store)
    }

    #[tokio::test]
    async fn test_list_read_overlapping_a_write_is_not_cached() {
        let (view, store) = gated_view().await;
        let query = ListQuery::default();
        let reader = tokio::spawn({
            let view = view.clone();
            let query = query.clone();
            async move { view.list(&query).await }
        });
        store.read_done.notified().await;

        let mut item = store.inner.get("p1").await.unwrap().unwrap();
        item.stock = Quantity::new(1);
        view.update(&item).await.unwrap();
        store.release.notify_one();

        assert_eq!(reader.await.unwrap().unwrap().items[0].stock, Quantity::new(5));
        assert_eq!(view.list(&query).await.unwrap().items[0].stock, Quantity::new(1));
    }

    #[tokio::test]
    async fn test_item_read_overlapping_a_decrement_is_not_cached() {
        let (view, store) = gated_view().await;
        let reader = tokio::spawn({
            let view = view.clone();
            async move { view.get("p1").await }
        });
        store.read_done.notified().await;

        StockMutator::new(view.clone()).decrease("p1", 3).await.unwrap();
        store.release.notify_one();

        assert_eq!(reader.await.unwrap().unwrap().unwrap().stock, Quantity::new(5));
        assert_eq!(view.get("p1").await.unwrap().unwrap().stock, Quantity::new(2));
    }
}
