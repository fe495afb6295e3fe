//! OpenSASE Inventory Sync
//!
//! Keeps catalog stock in step with placed orders.
//!
//! ## Features
//! - `order.created` consumption with dead-letter routing
//! - Concurrent per-line stock decrements with partial-failure reporting
//! - Atomic conditional decrement (stock never goes negative)
//! - Redelivery-safe decrements through an order/line ledger
//! - Cache-aside catalog reads with invalidation on every write

pub mod catalog;
pub mod config;
pub mod domain;
pub mod http;
pub mod inventory;
pub mod messaging;
pub mod store;

use std::time::Duration;
use thiserror::Error;

pub use catalog::{CachingCatalogView, CatalogPage, CatalogStore, ListQuery};
pub use domain::{CatalogItem, LineItem, OrderCreatedFact, StockUpdateOutcome};
pub use inventory::{StockMutator, StockSyncOrchestrator};
pub use messaging::{OrderEventConsumer, OrderEventPublisher};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: u32,
        available: u32,
    },

    #[error("Invalid quantity")]
    InvalidQuantity,

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Message bus error: {0}")]
    Bus(String),

    #[error("{failed} of {total} items failed stock update for order {order_id}")]
    PartialFailure {
        order_id: String,
        failed: usize,
        total: usize,
    },

    #[error("Handler aborted: {0}")]
    HandlerAborted(String),

    #[error("Handler timed out after {0:?}")]
    HandlerTimeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<redis::RedisError> for InventoryError {
    fn from(e: redis::RedisError) -> Self {
        Self::Cache(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InventoryError>;
