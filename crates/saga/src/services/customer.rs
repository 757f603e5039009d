//! Customer channel trait and in-memory implementation.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::AggregateId;

use crate::error::SagaError;

/// Channel that tells a customer about their order.
///
/// The saga calls it at most once per order for the "order ready" message;
/// a retry only happens after a recorded failure.
#[async_trait]
pub trait CustomerChannel: Send + Sync {
    async fn notify(&self, order_id: AggregateId, text: &str) -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryCustomerState {
    delivered: Vec<(AggregateId, String)>,
    failures_remaining: u32,
    attempts: u32,
}

/// In-memory customer channel for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustomerChannel {
    state: Arc<RwLock<InMemoryCustomerState>>,
}

impl InMemoryCustomerChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` notify calls fail.
    pub fn fail_next(&self, count: u32) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .failures_remaining = count;
    }

    /// Messages delivered for one order.
    pub fn notifications_for(&self, order_id: AggregateId) -> Vec<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .delivered
            .iter()
            .filter(|(id, _)| *id == order_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn delivered_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .delivered
            .len()
    }

    /// Calls made, successful or not.
    pub fn attempts(&self) -> u32 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .attempts
    }
}

#[async_trait]
impl CustomerChannel for InMemoryCustomerChannel {
    async fn notify(&self, order_id: AggregateId, text: &str) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.attempts += 1;

        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(SagaError::Messaging(format!(
                "customer channel unavailable for order {order_id}"
            )));
        }

        state.delivered.push((order_id, text.to_string()));
        Ok(())
    }
}
