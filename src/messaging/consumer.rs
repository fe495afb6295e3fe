//! `order.created` consumer with dead-letter routing.
//!
//! Every inbound message is handled on its own task, so a slow, failing or
//! panicking handler never holds up delivery of the next message. Payloads that
//! do not decode, and payloads whose handler fails or times out, are republished
//! verbatim to the dead-letter subject.

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use crate::domain::events::now_nanos;
use crate::domain::OrderCreatedFact;
use crate::inventory::SyncMetrics;
use crate::messaging::{MessageBus, MessageStream, SUBJECT_DEAD_LETTER, SUBJECT_ORDER_CREATED};
use crate::{InventoryError, Result};

/// Business callback invoked once per decoded `order.created` fact.
#[async_trait]
pub trait OrderCreatedHandler: Send + Sync {
    async fn handle(&self, fact: &OrderCreatedFact) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct ConsumerConfig {
    pub subject: String,
    pub dead_letter_subject: String,
    pub handler_timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            subject: SUBJECT_ORDER_CREATED.to_string(),
            dead_letter_subject: SUBJECT_DEAD_LETTER.to_string(),
            handler_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeadLetterReason { Undecodable, HandlerFailed, HandlerTimedOut }

/// What happened to one inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Processed,
    DeadLettered(DeadLetterReason),
}

pub struct OrderEventConsumer {
    inner: Arc<ConsumerInner>,
    subscription: Mutex<Option<Subscription>>,
}

struct ConsumerInner {
    bus: Arc<dyn MessageBus>,
    metrics: Arc<dyn SyncMetrics>,
    config: ConsumerConfig,
}

struct Subscription {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// Extra time granted past the handler timeout for a dead-letter publish during shutdown.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

impl OrderEventConsumer {
    pub fn new(bus: Arc<dyn MessageBus>, metrics: Arc<dyn SyncMetrics>, config: ConsumerConfig) -> Self {
        Self { inner: Arc::new(ConsumerInner { bus, metrics, config }), subscription: Mutex::new(None) }
    }

    /// Subscribes to the order-created subject and dispatches each message to `handler`.
    /// A failure here is fatal: the service cannot run without its subscription.
    pub async fn subscribe(&self, handler: Arc<dyn OrderCreatedHandler>) -> Result<()> {
        let subject = self.inner.config.subject.clone();
        let mut slot = self.subscription.lock().await;
        if slot.is_some() {
            return Err(InventoryError::Bus(format!("already subscribed to {subject}")));
        }
        let started = Instant::now();
        let stream = self.inner.bus.subscribe(&subject).await.inspect_err(|e| {
            tracing::error!(subject, error = %e, "Error subscribing");
        })?;

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(self.inner.clone().run(stream, handler, shutdown.clone()));
        *slot = Some(Subscription { shutdown, task });
        tracing::info!(subject, latency_ms = started.elapsed().as_millis() as u64, "Subscribed");
        Ok(())
    }

    /// Runs one payload through decode, handler and dead-letter routing.
    pub async fn handle_message(&self, payload: &[u8], handler: Arc<dyn OrderCreatedHandler>) -> Disposition {
        self.inner.process(payload, handler).await
    }

    /// Best-effort dead-letter publish: failures are logged and returned, never retried.
    pub async fn publish_to_dlq(&self, subject: &str, payload: &[u8]) -> Result<()> {
        self.inner.publish_to_dlq(subject, payload).await
    }

    pub async fn is_subscribed(&self) -> bool {
        self.subscription.lock().await.is_some()
    }

    /// Stops receiving, waits for in-flight messages to be processed or
    /// dead-lettered, then releases the bus. A no-op when not subscribed.
    pub async fn close(&self) -> Result<()> {
        let Some(subscription) = self.subscription.lock().await.take() else { return Ok(()) };
        subscription.shutdown.cancel();
        if let Err(e) = subscription.task.await {
            tracing::error!(error = %e, "Consumer loop ended abnormally");
        }
        tracing::info!(subject = self.inner.config.subject, "Unsubscribed");
        self.inner.bus.close().await?;
        tracing::info!("Consumer connection closed");
        Ok(())
    }
}

impl ConsumerInner {
    async fn run(self: Arc<Self>, mut stream: MessageStream, handler: Arc<dyn OrderCreatedHandler>, shutdown: CancellationToken) {
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                message = stream.next() => match message {
                    Some(message) => {
                        let inner = self.clone();
                        let handler = handler.clone();
                        in_flight.spawn(async move {
                            inner.process(&message.payload, handler).await;
                        });
                    }
                    None => {
                        tracing::info!("Order event stream ended");
                        break;
                    }
                },
            }
        }
        drop(stream);
        self.drain(in_flight).await;
    }

    async fn drain(&self, mut in_flight: JoinSet<()>) {
        if in_flight.is_empty() { return; }
        tracing::info!(pending = in_flight.len(), "Waiting for in-flight order events");
        let bound = self.config.handler_timeout + DRAIN_GRACE;
        let drained = tokio::time::timeout(bound, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(remaining = in_flight.len(), "In-flight order events abandoned at shutdown");
            in_flight.abort_all();
        }
    }

    async fn process(&self, payload: &[u8], handler: Arc<dyn OrderCreatedHandler>) -> Disposition {
        let received_at = now_nanos();
        let dlq = self.config.dead_letter_subject.as_str();

        let fact = match OrderCreatedFact::from_slice(payload) {
            Ok(fact) => fact,
            Err(e) => {
                tracing::warn!(subject = self.config.subject, size_bytes = payload.len(), error = %e, "Error decoding message");
                let _ = self.publish_to_dlq(dlq, payload).await;
                return Disposition::DeadLettered(DeadLetterReason::Undecodable);
            }
        };
        let order_id = fact.order_id().to_string();
        tracing::info!(
            order_id,
            items = fact.items().len(),
            latency_ms = fact.latency_ms(received_at),
            "Received order.created event"
        );

        let started = Instant::now();
        let timeout = self.config.handler_timeout;
        let mut task = tokio::spawn(async move { handler.handle(&fact).await });
        let outcome = match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result.map_err(|e| (DeadLetterReason::HandlerFailed, e)),
            Ok(Err(join_error)) => Err((DeadLetterReason::HandlerFailed, InventoryError::HandlerAborted(join_error.to_string()))),
            Err(_) => {
                task.abort();
                Err((DeadLetterReason::HandlerTimedOut, InventoryError::HandlerTimeout(timeout)))
            }
        };
        let proc_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(()) => {
                self.metrics.record_event_processed();
                tracing::info!(order_id, proc_time_ms, "Processed order.created event");
                Disposition::Processed
            }
            Err((reason, e)) => {
                tracing::error!(order_id, proc_time_ms, error = %e, "Error handling order.created event");
                let _ = self.publish_to_dlq(dlq, payload).await;
                Disposition::DeadLettered(reason)
            }
        }
    }

    async fn publish_to_dlq(&self, subject: &str, payload: &[u8]) -> Result<()> {
        let started = Instant::now();
        match self.bus.publish(subject, payload.to_vec()).await {
            Ok(()) => {
                tracing::info!(subject, size_bytes = payload.len(), latency_ms = started.elapsed().as_millis() as u64, "Published message to DLQ");
                Ok(())
            }
            Err(e) => {
                tracing::error!(subject, size_bytes = payload.len(), error = %e, "Error publishing to DLQ");
                Err(e)
            }
        }
    }
}
