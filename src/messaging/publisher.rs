//! Publishes `order.created` facts.
//!
//! Publishing is attempted once. Callers on a request path log a failure and
//! carry on; an order can then exist without its event having been delivered.

use std::sync::Arc;
use std::time::Instant;
use crate::domain::OrderCreatedFact;
use crate::messaging::{MessageBus, SUBJECT_ORDER_CREATED};
use crate::Result;

#[derive(Clone)]
pub struct OrderEventPublisher {
    bus: Arc<dyn MessageBus>,
}

impl OrderEventPublisher {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self { Self { bus } }

    /// Stamps the fact with the current time if it carries none, then publishes it.
    /// Returns the fact exactly as it went on the wire.
    pub async fn publish_order_created(&self, fact: &OrderCreatedFact) -> Result<OrderCreatedFact> {
        let started = Instant::now();
        let fact = fact.stamped();
        let payload = fact.to_vec().inspect_err(|e| {
            tracing::error!(order_id = fact.order_id(), error = %e, "Failed to encode order.created event");
        })?;
        let size_bytes = payload.len();

        self.bus.publish(SUBJECT_ORDER_CREATED, payload).await.inspect_err(|e| {
            tracing::error!(order_id = fact.order_id(), error = %e, latency_ms = started.elapsed().as_millis() as u64, "Failed to publish order.created event");
        })?;

        tracing::info!(
            order_id = fact.order_id(),
            items = fact.items().len(),
            size_bytes,
            subject = SUBJECT_ORDER_CREATED,
            latency_ms = started.elapsed().as_millis() as u64,
            "Published order.created event"
        );
        Ok(fact)
    }

    pub async fn close(&self) -> Result<()> { self.bus.close().await }
}
