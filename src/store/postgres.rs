//! Postgres catalog store and decrement ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use crate::catalog::{CatalogPage, CatalogStore, ListQuery};
use crate::domain::{CatalogItem, Quantity};
use crate::inventory::{DecrementLedger, StockDecrement, StockStore};
use crate::{InventoryError, Result};

#[derive(Debug, sqlx::FromRow)]
struct CatalogRow {
    id: String,
    name: String,
    description: String,
    price: Decimal,
    stock: i32,
    category_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CatalogRow> for CatalogItem {
    fn from(r: CatalogRow) -> Self {
        Self {
            id: r.id, name: r.name, description: r.description, price: r.price,
            stock: to_quantity(r.stock), category_id: r.category_id,
            created_at: r.created_at, updated_at: r.updated_at,
        }
    }
}

fn to_quantity(stock: i32) -> Quantity { Quantity::new(u32::try_from(stock).unwrap_or(0)) }

fn to_db_int(value: u32) -> Result<i32> { i32::try_from(value).map_err(|_| InventoryError::InvalidQuantity) }

#[derive(Clone)]
pub struct PgCatalogStore {
    db: PgPool,
}

impl PgCatalogStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl StockStore for PgCatalogStore {
    async fn get(&self, id: &str) -> Result<Option<CatalogItem>> {
        let row = sqlx::query_as::<_, CatalogRow>("SELECT * FROM catalog_items WHERE id = $1")
            .bind(id).fetch_optional(&self.db).await?;
        Ok(row.map(CatalogItem::from))
    }

    async fn decrement_stock(&self, id: &str, quantity: u32) -> Result<StockDecrement> {
        let quantity = to_db_int(quantity)?;
        let applied: Option<(i32,)> = sqlx::query_as(
            "UPDATE catalog_items SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2 RETURNING stock",
        )
        .bind(id).bind(quantity).fetch_optional(&self.db).await?;
        if let Some((remaining,)) = applied {
            return Ok(StockDecrement::Applied { remaining: to_quantity(remaining) });
        }

        let current: Option<(i32,)> = sqlx::query_as("SELECT stock FROM catalog_items WHERE id = $1")
            .bind(id).fetch_optional(&self.db).await?;
        Ok(match current {
            Some((available,)) => StockDecrement::Insufficient { available: to_quantity(available) },
            None => StockDecrement::NotFound,
        })
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn create(&self, item: &CatalogItem) -> Result<()> {
        sqlx::query("INSERT INTO catalog_items (id, name, description, price, stock, category_id, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
            .bind(&item.id).bind(&item.name).bind(&item.description).bind(item.price)
            .bind(to_db_int(item.stock.value())?).bind(&item.category_id).bind(item.created_at).bind(item.updated_at)
            .execute(&self.db).await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => InventoryError::Storage(format!("product already exists: {}", item.id)),
                other => InventoryError::Database(other),
            })?;
        Ok(())
    }

    async fn update(&self, item: &CatalogItem) -> Result<()> {
        let result = sqlx::query("UPDATE catalog_items SET name = $2, description = $3, price = $4, stock = $5, category_id = $6, updated_at = NOW() WHERE id = $1")
            .bind(&item.id).bind(&item.name).bind(&item.description).bind(item.price)
            .bind(to_db_int(item.stock.value())?).bind(&item.category_id)
            .execute(&self.db).await?;
        if result.rows_affected() == 0 { return Err(InventoryError::ProductNotFound(item.id.clone())); }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM catalog_items WHERE id = $1").bind(id).execute(&self.db).await?;
        if result.rows_affected() == 0 { return Err(InventoryError::ProductNotFound(id.to_string())); }
        Ok(())
    }

    async fn list(&self, query: &ListQuery) -> Result<CatalogPage> {
        let items = sqlx::query_as::<_, CatalogRow>("SELECT * FROM catalog_items WHERE ($1 = '' OR category_id = $1) ORDER BY name, id LIMIT $2 OFFSET $3")
            .bind(&query.category).bind(i64::from(query.page_size)).bind(query.offset() as i64)
            .fetch_all(&self.db).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM catalog_items WHERE ($1 = '' OR category_id = $1)")
            .bind(&query.category).fetch_one(&self.db).await?;
        Ok(CatalogPage { items: items.into_iter().map(CatalogItem::from).collect(), total: total.0.max(0) as u64 })
    }
}

#[derive(Clone)]
pub struct PgDecrementLedger {
    db: PgPool,
}

impl PgDecrementLedger {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl DecrementLedger for PgDecrementLedger {
    async fn claim(&self, order_id: &str, line_index: usize, product_id: &str, quantity: u32) -> Result<bool> {
        let result = sqlx::query("INSERT INTO stock_decrements (order_id, line_index, product_id, quantity) VALUES ($1, $2, $3, $4) ON CONFLICT (order_id, line_index) DO NOTHING")
            .bind(order_id).bind(line_index as i32).bind(product_id).bind(to_db_int(quantity)?)
            .execute(&self.db).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, order_id: &str, line_index: usize) -> Result<()> {
        sqlx::query("DELETE FROM stock_decrements WHERE order_id = $1 AND line_index = $2")
            .bind(order_id).bind(line_index as i32)
            .execute(&self.db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_conversion_clamps_negative_stock() {
        let now = Utc::now();
        let row = CatalogRow {
            id: "p1".into(), name: "Widget".into(), description: String::new(), price: Decimal::ONE,
            stock: -4, category_id: "tools".into(), created_at: now, updated_at: now,
        };
        let item = CatalogItem::from(row);
        assert!(item.stock.is_zero());
        assert_eq!(item.category_id, "tools");
    }

    #[test]
    fn test_quantities_beyond_int4_are_rejected() {
        assert_eq!(to_db_int(7).unwrap(), 7);
        assert!(matches!(to_db_int(u32::MAX), Err(InventoryError::InvalidQuantity)));
    }
}
