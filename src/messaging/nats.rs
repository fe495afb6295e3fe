//! NATS core transport.

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Mutex;
use std::time::Instant;
use crate::messaging::{BusMessage, MessageBus, MessageStream};
use crate::{InventoryError, Result};

/// Holds the client until `close`, after which every operation fails.
pub struct NatsBus {
    client: Mutex<Option<async_nats::Client>>,
}

impl NatsBus {
    pub async fn connect(url: &str) -> Result<Self> {
        let started = Instant::now();
        tracing::info!(url, "Connecting to NATS");
        let client = async_nats::connect(url).await.map_err(|e| {
            tracing::error!(url, error = %e, latency_ms = started.elapsed().as_millis() as u64, "Failed to connect to NATS");
            InventoryError::Bus(format!("connect {url}: {e}"))
        })?;
        tracing::info!(url, latency_ms = started.elapsed().as_millis() as u64, "Connected to NATS");
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: async_nats::Client) -> Self { Self { client: Mutex::new(Some(client)) } }

    fn client(&self) -> Result<async_nats::Client> {
        self.client
            .lock()
            .map_err(|_| InventoryError::Bus("NATS client lock poisoned".into()))?
            .clone()
            .ok_or_else(|| InventoryError::Bus("NATS connection closed".into()))
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()> {
        self.client()?
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| InventoryError::Bus(format!("publish to {subject}: {e}")))
    }

    async fn subscribe(&self, subject: &str) -> Result<MessageStream> {
        let subscriber = self
            .client()?
            .subscribe(subject.to_string())
            .await
            .map_err(|e| InventoryError::Bus(format!("subscribe to {subject}: {e}")))?;
        Ok(Box::pin(subscriber.map(|msg| BusMessage {
            subject: msg.subject.to_string(),
            payload: msg.payload.to_vec(),
        })))
    }

    async fn close(&self) -> Result<()> {
        let taken = self
            .client
            .lock()
            .map_err(|_| InventoryError::Bus("NATS client lock poisoned".into()))?
            .take();
        let Some(client) = taken else { return Ok(()) };
        client.flush().await.map_err(|e| InventoryError::Bus(format!("flush: {e}")))?;
        drop(client);
        tracing::info!("NATS connection released");
        Ok(())
    }
}
