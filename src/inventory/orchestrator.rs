//! Fans one order's line items out to concurrent stock decrements.
//!
//! Every line is always attempted; one failing line does not cancel the others,
//! and lines that succeed stay applied. Each unit writes its outcome into the
//! slot for its line index, so the join needs no shared accumulator.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use crate::domain::{LineItem, OrderCreatedFact, StockUpdateOutcome};
use crate::inventory::{DecrementLedger, StockMutator, SyncMetrics};
use crate::messaging::OrderCreatedHandler;
use crate::{InventoryError, Result};

pub struct StockSyncOrchestrator {
    mutator: StockMutator,
    metrics: Arc<dyn SyncMetrics>,
    ledger: Option<Arc<dyn DecrementLedger>>,
}

impl StockSyncOrchestrator {
    pub fn new(mutator: StockMutator, metrics: Arc<dyn SyncMetrics>) -> Self {
        Self { mutator, metrics, ledger: None }
    }

    /// Claims each line in the ledger before decrementing it; already-claimed lines are skipped.
    pub fn with_ledger(mut self, ledger: Arc<dyn DecrementLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Decrements every line concurrently and returns one outcome per line, in line order.
    pub async fn apply(&self, fact: &OrderCreatedFact) -> Vec<StockUpdateOutcome> {
        let items = fact.items();
        let mut units = JoinSet::new();
        for (index, item) in items.iter().cloned().enumerate() {
            let mutator = self.mutator.clone();
            let ledger = self.ledger.clone();
            let order_id = fact.order_id().to_string();
            units.spawn(async move {
                (index, decrease_line(mutator, ledger, order_id, index, item).await)
            });
        }

        let mut slots: Vec<Option<StockUpdateOutcome>> = vec![None; items.len()];
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => tracing::error!(order_id = fact.order_id(), error = %e, "Stock update unit aborted"),
            }
        }

        slots
            .into_iter()
            .zip(items)
            .map(|(slot, item)| {
                let outcome = slot.unwrap_or_else(|| {
                    StockUpdateOutcome::failed(item, &InventoryError::HandlerAborted("stock update unit aborted".into()))
                });
                if !outcome.success { self.metrics.record_stock_update_error(); }
                outcome
            })
            .collect()
    }
}

async fn decrease_line(
    mutator: StockMutator,
    ledger: Option<Arc<dyn DecrementLedger>>,
    order_id: String,
    index: usize,
    item: LineItem,
) -> StockUpdateOutcome {
    if let Some(ledger) = &ledger {
        match ledger.claim(&order_id, index, item.product_id(), item.quantity()).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(order_id, line = index, product_id = item.product_id(), "Line already claimed, skipping");
                return StockUpdateOutcome::succeeded(&item);
            }
            Err(e) => {
                tracing::error!(order_id, line = index, error = %e, "Ledger claim failed");
                return StockUpdateOutcome::failed(&item, &e);
            }
        }
    }

    match mutator.decrease(item.product_id(), item.quantity()).await {
        Ok(_) => StockUpdateOutcome::succeeded(&item),
        Err(e) => {
            tracing::warn!(order_id, product_id = item.product_id(), quantity = item.quantity(), error = %e, "Failed to update stock");
            if let Some(ledger) = &ledger {
                if let Err(release_err) = ledger.release(&order_id, index).await {
                    tracing::error!(order_id, line = index, error = %release_err, "Failed to release ledger claim, replay will skip this line");
                }
            }
            StockUpdateOutcome::failed(&item, &e)
        }
    }
}

#[async_trait]
impl OrderCreatedHandler for StockSyncOrchestrator {
    async fn handle(&self, fact: &OrderCreatedFact) -> Result<()> {
        let started = Instant::now();
        tracing::info!(order_id = fact.order_id(), items = fact.items().len(), "Processing order.created event");

        let outcomes = self.apply(fact).await;
        let failed = outcomes.iter().filter(|o| !o.success).count();
        if failed > 0 {
            tracing::warn!(order_id = fact.order_id(), failed, total = outcomes.len(), "Items failed stock update");
            return Err(InventoryError::PartialFailure {
                order_id: fact.order_id().to_string(),
                failed,
                total: outcomes.len(),
            });
        }

        tracing::info!(order_id = fact.order_id(), latency_ms = started.elapsed().as_millis() as u64, "Processed order");
        Ok(())
    }
}
