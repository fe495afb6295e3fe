//! Catalog read/write surface and its cache-aside view.
pub mod cache;
pub mod redis_cache;
pub mod view;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::domain::CatalogItem;
use crate::inventory::StockStore;
use crate::Result;

pub use cache::{CacheLayer, DisabledCache, InMemoryCache};
pub use redis_cache::RedisCache;
pub use view::CachingCatalogView;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Category filter plus 1-based pagination. An empty category means no filter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListQuery {
    pub category: String,
    pub page: u32,
    pub page_size: u32,
}

impl ListQuery {
    pub fn new(category: impl Into<String>, page: u32, page_size: u32) -> Self {
        Self { category: category.into(), page: page.max(1), page_size: page_size.clamp(1, MAX_PAGE_SIZE) }
    }

    pub fn offset(&self) -> u64 { u64::from(self.page - 1) * u64::from(self.page_size) }
}

impl Default for ListQuery {
    fn default() -> Self { Self::new("", 1, DEFAULT_PAGE_SIZE) }
}

/// One page of catalog items plus the total matching the filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogPage {
    pub items: Vec<CatalogItem>,
    pub total: u64,
}

/// Full catalog access. `update` and `delete` report a missing record as
/// `ProductNotFound`, distinct from storage failures.
#[async_trait]
pub trait CatalogStore: StockStore {
    async fn create(&self, item: &CatalogItem) -> Result<()>;
    async fn update(&self, item: &CatalogItem) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn list(&self, query: &ListQuery) -> Result<CatalogPage>;
}
