//! Domain layer
pub mod aggregates;
pub mod events;
pub mod value_objects;

pub use aggregates::CatalogItem;
pub use events::{LineItem, OrderCreatedFact, StockUpdateOutcome};
pub use value_objects::Quantity;
