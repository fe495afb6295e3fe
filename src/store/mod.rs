//! Store implementations.
pub mod memory;
pub mod postgres;

pub use memory::InMemoryCatalogStore;
pub use postgres::{PgCatalogStore, PgDecrementLedger};
