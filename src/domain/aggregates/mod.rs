//! Aggregates module
pub mod catalog_item;

pub use catalog_item::CatalogItem;
