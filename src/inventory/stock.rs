//! Stock decrements against the authoritative catalog store.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use crate::domain::{CatalogItem, Quantity};
use crate::{InventoryError, Result};

/// Result of a conditional decrement, decided atomically by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockDecrement {
    Applied { remaining: Quantity },
    Insufficient { available: Quantity },
    NotFound,
}

/// Single-record access to stock-bearing catalog items.
#[async_trait]
pub trait StockStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<CatalogItem>>;

    /// Subtracts `quantity` only if the current stock covers it, as one atomic
    /// step. Stock is left untouched unless the result is `Applied`.
    async fn decrement_stock(&self, id: &str, quantity: u32) -> Result<StockDecrement>;
}

#[derive(Clone)]
pub struct StockMutator {
    store: Arc<dyn StockStore>,
}

impl StockMutator {
    pub fn new(store: Arc<dyn StockStore>) -> Self { Self { store } }

    /// Decreases stock for `product_id` by `quantity`, failing with
    /// `ProductNotFound` or `InsufficientStock` without writing anything.
    pub async fn decrease(&self, product_id: &str, quantity: u32) -> Result<Quantity> {
        if quantity == 0 { return Err(InventoryError::InvalidQuantity); }
        let started = Instant::now();
        tracing::debug!(product_id, quantity, "Attempting to decrease stock");

        match self.store.decrement_stock(product_id, quantity).await? {
            StockDecrement::Applied { remaining } => {
                tracing::info!(
                    product_id,
                    from = remaining.value() + quantity,
                    to = remaining.value(),
                    latency_ms = started.elapsed().as_millis() as u64,
                    "Decreased stock"
                );
                Ok(remaining)
            }
            StockDecrement::Insufficient { available } => Err(InventoryError::InsufficientStock {
                product_id: product_id.to_string(),
                requested: quantity,
                available: available.value(),
            }),
            StockDecrement::NotFound => Err(InventoryError::ProductNotFound(product_id.to_string())),
        }
    }
}
