//! Order-to-stock synchronization.
pub mod ledger;
pub mod metrics;
pub mod orchestrator;
pub mod stock;

pub use ledger::{DecrementLedger, InMemoryLedger};
pub use metrics::{AtomicSyncMetrics, SyncMetrics};
pub use orchestrator::StockSyncOrchestrator;
pub use stock::{StockDecrement, StockMutator, StockStore};
