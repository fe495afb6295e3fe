//! In-process bus with NATS-like fan-out. Every publish is also kept in a log
//! so callers can inspect what went out.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use crate::messaging::{BusMessage, MessageBus, MessageStream};
use crate::{InventoryError, Result};

#[derive(Default)]
pub struct InMemoryBus {
    subscribers: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<BusMessage>>>>,
    published: Mutex<Vec<BusMessage>>,
    fail_publish: AtomicBool,
    closed: AtomicBool,
}

impl InMemoryBus {
    pub fn new() -> Self { Self::default() }

    /// Makes every following publish fail with a transport error.
    pub fn fail_publishes(&self, fail: bool) { self.fail_publish.store(fail, Ordering::SeqCst); }

    pub fn published(&self) -> Vec<BusMessage> {
        self.published.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn published_to(&self, subject: &str) -> Vec<Vec<u8>> {
        self.published().into_iter().filter(|m| m.subject == subject).map(|m| m.payload).collect()
    }

    pub fn is_closed(&self) -> bool { self.closed.load(Ordering::SeqCst) }

    fn lock_err<T>(_: T) -> InventoryError { InventoryError::Bus("in-memory bus lock poisoned".into()) }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) || self.is_closed() {
            return Err(InventoryError::Bus(format!("publish to {subject} rejected")));
        }
        let message = BusMessage { subject: subject.to_string(), payload };
        self.published.lock().map_err(Self::lock_err)?.push(message.clone());
        let mut subscribers = self.subscribers.lock().map_err(Self::lock_err)?;
        if let Some(senders) = subscribers.get_mut(subject) {
            senders.retain(|tx| tx.send(message.clone()).is_ok());
        }
        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<MessageStream> {
        if self.is_closed() {
            return Err(InventoryError::Bus(format!("subscribe to {subject} on closed bus")));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().map_err(Self::lock_err)?.entry(subject.to_string()).or_default().push(tx);
        Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|message| (message, rx))
        })))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.subscribers.lock().map_err(Self::lock_err)?.clear();
        Ok(())
    }
}
