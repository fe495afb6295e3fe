//! Domain events
//!
//! `OrderCreatedFact` is also the wire format on `order.created`:
//! `{order_id, user_id, items: [{product_id, quantity, price}], total, timestamp}`.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};
use crate::{InventoryError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct LineItem {
    #[validate(length(min = 1))]
    product_id: String,
    #[validate(range(min = 1))]
    quantity: u32,
    #[serde(rename = "price", with = "rust_decimal::serde::float")]
    #[validate(custom = "positive_price")]
    unit_price: Decimal,
}

impl LineItem {
    pub fn new(product_id: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        Self { product_id: product_id.into(), quantity, unit_price }
    }
    pub fn product_id(&self) -> &str { &self.product_id }
    pub fn quantity(&self) -> u32 { self.quantity }
    pub fn unit_price(&self) -> Decimal { self.unit_price }
    pub fn line_total(&self) -> Decimal { self.unit_price * Decimal::from(self.quantity) }
}

fn positive_price(price: &Decimal) -> std::result::Result<(), ValidationError> {
    if price.is_sign_positive() && !price.is_zero() { Ok(()) } else { Err(ValidationError::new("price_not_positive")) }
}

/// Immutable record of a placed order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct OrderCreatedFact {
    #[validate(length(min = 1))]
    order_id: String,
    user_id: String,
    #[validate]
    items: Vec<LineItem>,
    #[serde(with = "rust_decimal::serde::float")]
    total: Decimal,
    /// Nanoseconds since the Unix epoch; 0 until the publisher stamps it.
    #[serde(default)]
    timestamp: i64,
}

impl OrderCreatedFact {
    /// Builds a fact with `total` computed from the line items.
    pub fn new(order_id: impl Into<String>, user_id: impl Into<String>, items: Vec<LineItem>) -> Self {
        let total = items.iter().map(LineItem::line_total).sum();
        Self { order_id: order_id.into(), user_id: user_id.into(), items, total, timestamp: 0 }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self { self.timestamp = timestamp; self }

    pub fn order_id(&self) -> &str { &self.order_id }
    pub fn user_id(&self) -> &str { &self.user_id }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn total(&self) -> Decimal { self.total }
    pub fn timestamp(&self) -> i64 { self.timestamp }
    pub fn has_timestamp(&self) -> bool { self.timestamp > 0 }

    /// Copy of this fact carrying the current time if it has none yet.
    pub fn stamped(&self) -> Self {
        if self.has_timestamp() { return self.clone(); }
        self.clone().with_timestamp(now_nanos())
    }

    /// Milliseconds between the publish stamp and `received_at_nanos`.
    pub fn latency_ms(&self, received_at_nanos: i64) -> Option<f64> {
        self.has_timestamp().then(|| (received_at_nanos - self.timestamp) as f64 / 1e6)
    }

    /// Decodes and validates a wire payload.
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        let fact: Self = serde_json::from_slice(payload)?;
        fact.validate().map_err(|e| InventoryError::InvalidEvent(e.to_string()))?;
        Ok(fact)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

pub(crate) fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

/// Result of one line item's stock decrement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StockUpdateOutcome {
    pub product_id: String,
    pub quantity: u32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StockUpdateOutcome {
    pub fn succeeded(item: &LineItem) -> Self {
        Self { product_id: item.product_id.clone(), quantity: item.quantity, success: true, error: None }
    }
    pub fn failed(item: &LineItem, error: &InventoryError) -> Self {
        Self { product_id: item.product_id.clone(), quantity: item.quantity, success: false, error: Some(error.to_string()) }
    }
}
