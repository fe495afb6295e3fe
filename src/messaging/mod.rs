//! Event bus plumbing: the `MessageBus` seam plus the order-created publisher and consumer.

pub mod consumer;
pub mod memory;
pub mod nats;
pub mod publisher;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use crate::Result;

pub use consumer::{ConsumerConfig, DeadLetterReason, Disposition, OrderCreatedHandler, OrderEventConsumer};
pub use memory::InMemoryBus;
pub use nats::NatsBus;
pub use publisher::OrderEventPublisher;

pub const SUBJECT_ORDER_CREATED: &str = "order.created";
pub const SUBJECT_DEAD_LETTER: &str = "dead.letter.queue";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusMessage {
    pub subject: String,
    pub payload: Vec<u8>,
}

/// Messages delivered on one subscription. Dropping the stream unsubscribes.
pub type MessageStream = Pin<Box<dyn Stream<Item = BusMessage> + Send>>;

/// Subject-addressed publish/subscribe transport.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()>;
    async fn subscribe(&self, subject: &str) -> Result<MessageStream>;
    /// Flushes pending publishes and releases the connection.
    async fn close(&self) -> Result<()>;
}
