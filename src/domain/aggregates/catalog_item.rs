//! Catalog Item Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::Quantity;
use crate::InventoryError;

/// The stock-bearing catalog record. The store is authoritative for it; cached
/// copies are projections only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: Quantity,
    pub category_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogItem {
    pub fn new(name: impl Into<String>, price: Decimal, stock: u32, category_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(), name: name.into(), description: String::new(),
            price, stock: Quantity::new(stock), category_id: category_id.into(),
            created_at: now, updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self { self.id = id.into(); self }
    pub fn with_description(mut self, description: impl Into<String>) -> Self { self.description = description.into(); self }

    pub fn in_category(&self, category_id: &str) -> bool {
        category_id.is_empty() || self.category_id == category_id
    }

    /// Removes `quantity` units. Leaves the record untouched when stock does not cover it.
    pub fn decrease_stock(&mut self, quantity: u32) -> Result<Quantity, InventoryError> {
        if quantity == 0 { return Err(InventoryError::InvalidQuantity); }
        self.stock = self.stock.subtract(quantity).ok_or_else(|| InventoryError::InsufficientStock {
            product_id: self.id.clone(),
            requested: quantity,
            available: self.stock.value(),
        })?;
        self.touch();
        Ok(self.stock)
    }

    pub fn add_stock(&mut self, quantity: u32) { self.stock = self.stock.add(quantity); self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_decrease_stock() {
        let mut item = CatalogItem::new("Widget", Decimal::new(999, 2), 5, "tools");
        assert_eq!(item.decrease_stock(2).unwrap(), Quantity::new(3));
        assert_eq!(item.stock.value(), 3);
    }
    #[test]
    fn test_insufficient_stock_leaves_record_unchanged() {
        let mut item = CatalogItem::new("Widget", Decimal::new(999, 2), 3, "tools");
        let before = item.clone();
        let err = item.decrease_stock(100).unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientStock { requested: 100, available: 3, .. }));
        assert_eq!(item, before);
    }
    #[test]
    fn test_zero_quantity_rejected() {
        let mut item = CatalogItem::new("Widget", Decimal::ONE, 3, "");
        assert!(matches!(item.decrease_stock(0), Err(InventoryError::InvalidQuantity)));
    }
    #[test]
    fn test_empty_category_matches_everything() {
        let item = CatalogItem::new("Widget", Decimal::ONE, 1, "tools");
        assert!(item.in_category(""));
        assert!(item.in_category("tools"));
        assert!(!item.in_category("garden"));
    }
}
