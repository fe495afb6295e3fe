//! Stock-sync counters.

use std::sync::atomic::{AtomicU64, Ordering};

pub const EVENTS_PROCESSED_TOTAL: &str = "inventory_events_processed_total";
pub const STOCK_UPDATE_ERRORS_TOTAL: &str = "inventory_stock_update_errors_total";

/// Counter sink injected into the consumer and the orchestrator.
pub trait SyncMetrics: Send + Sync {
    fn record_event_processed(&self);
    fn record_stock_update_error(&self);
    fn events_processed(&self) -> u64;
    fn stock_update_errors(&self) -> u64;
}

/// Atomic counters, mirrored to the `metrics` facade so an installed recorder
/// (Prometheus or otherwise) sees the same totals.
#[derive(Debug, Default)]
pub struct AtomicSyncMetrics {
    events_processed: AtomicU64,
    stock_update_errors: AtomicU64,
}

impl SyncMetrics for AtomicSyncMetrics {
    fn record_event_processed(&self) {
        let total = self.events_processed.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::counter!(EVENTS_PROCESSED_TOTAL).increment(1);
        tracing::debug!(events_processed_total = total, "Metrics updated");
    }

    fn record_stock_update_error(&self) {
        let total = self.stock_update_errors.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::counter!(STOCK_UPDATE_ERRORS_TOTAL).increment(1);
        tracing::debug!(stock_update_errors_total = total, "Metrics updated");
    }

    fn events_processed(&self) -> u64 { self.events_processed.load(Ordering::Relaxed) }

    fn stock_update_errors(&self) -> u64 { self.stock_update_errors.load(Ordering::Relaxed) }
}
