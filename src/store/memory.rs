//! In-memory catalog store, used by tests and local runs.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use crate::catalog::{CatalogPage, CatalogStore, ListQuery};
use crate::domain::CatalogItem;
use crate::inventory::{StockDecrement, StockStore};
use crate::{InventoryError, Result};

#[derive(Default)]
pub struct InMemoryCatalogStore {
    items: RwLock<HashMap<String, CatalogItem>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self { Self::default() }

    /// Inserts or replaces a record without going through `create`.
    pub async fn insert(&self, item: CatalogItem) {
        self.items.write().await.insert(item.id.clone(), item);
    }

    pub async fn restock(&self, id: &str, quantity: u32) -> Result<()> {
        let mut items = self.items.write().await;
        let item = items.get_mut(id).ok_or_else(|| InventoryError::ProductNotFound(id.to_string()))?;
        item.add_stock(quantity);
        Ok(())
    }
}

#[async_trait]
impl StockStore for InMemoryCatalogStore {
    async fn get(&self, id: &str) -> Result<Option<CatalogItem>> {
        Ok(self.items.read().await.get(id).cloned())
    }

    async fn decrement_stock(&self, id: &str, quantity: u32) -> Result<StockDecrement> {
        let mut items = self.items.write().await;
        let Some(item) = items.get_mut(id) else { return Ok(StockDecrement::NotFound) };
        match item.decrease_stock(quantity) {
            Ok(remaining) => Ok(StockDecrement::Applied { remaining }),
            Err(InventoryError::InsufficientStock { .. }) => Ok(StockDecrement::Insufficient { available: item.stock }),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn create(&self, item: &CatalogItem) -> Result<()> {
        let mut items = self.items.write().await;
        if items.contains_key(&item.id) {
            return Err(InventoryError::Storage(format!("product already exists: {}", item.id)));
        }
        items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn update(&self, item: &CatalogItem) -> Result<()> {
        let mut items = self.items.write().await;
        let existing = items.get_mut(&item.id).ok_or_else(|| InventoryError::ProductNotFound(item.id.clone()))?;
        *existing = CatalogItem { created_at: existing.created_at, updated_at: Utc::now(), ..item.clone() };
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.items.write().await.remove(id).map(|_| ()).ok_or_else(|| InventoryError::ProductNotFound(id.to_string()))
    }

    async fn list(&self, query: &ListQuery) -> Result<CatalogPage> {
        let items = self.items.read().await;
        let mut matching: Vec<&CatalogItem> = items.values().filter(|i| i.in_category(&query.category)).collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.page_size as usize)
            .cloned()
            .collect();
        Ok(CatalogPage { items: page, total })
    }
}
