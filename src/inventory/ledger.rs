//! Record of order lines whose stock has already been taken.
//!
//! A failed fact is redelivered whole, so lines that succeeded the first time
//! would be decremented again. Lines are keyed by `(order_id, line_index)`;
//! the index is stable because redelivery carries the original bytes. A line is
//! claimed before its decrement and released if the decrement fails, so two
//! overlapping deliveries of one fact take stock once.

use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::Mutex;
use crate::Result;

#[async_trait]
pub trait DecrementLedger: Send + Sync {
    /// Atomically claims a line before its decrement. Returns `false` when the
    /// line is already claimed, by an earlier delivery or one still in flight.
    async fn claim(&self, order_id: &str, line_index: usize, product_id: &str, quantity: u32) -> Result<bool>;

    /// Drops the claim of a line whose decrement did not apply.
    async fn release(&self, order_id: &str, line_index: usize) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryLedger {
    claimed: Mutex<HashSet<(String, usize)>>,
}

impl InMemoryLedger {
    pub fn new() -> Self { Self::default() }
    pub async fn len(&self) -> usize { self.claimed.lock().await.len() }
    pub async fn contains(&self, order_id: &str, line_index: usize) -> bool {
        self.claimed.lock().await.contains(&(order_id.to_string(), line_index))
    }
}

#[async_trait]
impl DecrementLedger for InMemoryLedger {
    async fn claim(&self, order_id: &str, line_index: usize, _product_id: &str, _quantity: u32) -> Result<bool> {
        Ok(self.claimed.lock().await.insert((order_id.to_string(), line_index)))
    }

    async fn release(&self, order_id: &str, line_index: usize) -> Result<()> {
        self.claimed.lock().await.remove(&(order_id.to_string(), line_index));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_claims_are_per_line() {
        let ledger = InMemoryLedger::new();
        assert!(ledger.claim("o1", 0, "p1", 2).await.unwrap());
        assert!(!ledger.claim("o1", 0, "p1", 2).await.unwrap());
        assert!(ledger.claim("o1", 1, "p1", 2).await.unwrap());
        assert!(ledger.claim("o2", 0, "p1", 2).await.unwrap());
        assert_eq!(ledger.len().await, 3);
    }

    #[tokio::test]
    async fn test_released_line_can_be_claimed_again() {
        let ledger = InMemoryLedger::new();
        assert!(ledger.claim("o1", 0, "p1", 2).await.unwrap());
        ledger.release("o1", 0).await.unwrap();
        assert!(!ledger.contains("o1", 0).await);
        assert!(ledger.claim("o1", 0, "p1", 2).await.unwrap());
    }
}
