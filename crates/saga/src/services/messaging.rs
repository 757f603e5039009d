//! Supplier messaging trait and in-memory outbox.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::SupplierId;

use crate::error::SagaError;

/// Outbound channel to suppliers.
///
/// Callers treat sends as fire-and-forget: a failure is logged and counted,
/// never rolled back.
#[async_trait]
pub trait SupplierMessenger: Send + Sync {
    async fn send(&self, supplier_id: &SupplierId, text: &str) -> Result<(), SagaError>;
}

/// A message that left through the in-memory outbox.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub supplier_id: SupplierId,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct InMemoryMessengerState {
    outbox: Vec<SentMessage>,
    fail_on_send: bool,
}

/// In-memory supplier messenger for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemorySupplierMessenger {
    state: Arc<RwLock<InMemoryMessengerState>>,
}

impl InMemorySupplierMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send fail until switched back.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_send = fail;
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .outbox
            .clone()
    }

    /// Texts sent to one supplier, oldest first.
    pub fn messages_for(&self, supplier_id: &SupplierId) -> Vec<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .outbox
            .iter()
            .filter(|message| &message.supplier_id == supplier_id)
            .map(|message| message.text.clone())
            .collect()
    }
}

#[async_trait]
impl SupplierMessenger for InMemorySupplierMessenger {
    async fn send(&self, supplier_id: &SupplierId, text: &str) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_send {
            return Err(SagaError::Messaging(format!(
                "supplier {supplier_id} unreachable"
            )));
        }

        tracing::debug!(%supplier_id, "supplier message queued");
        state.outbox.push(SentMessage {
            supplier_id: supplier_id.clone(),
            text: text.to_string(),
            sent_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_outbox_records_per_supplier() {
        let messenger = InMemorySupplierMessenger::new();
        let a = SupplierId::new("SUP-A");
        let b = SupplierId::new("SUP-B");

        messenger.send(&a, "hello a").await.unwrap();
        messenger.send(&b, "hello b").await.unwrap();

        assert_eq!(messenger.sent().len(), 2);
        assert_eq!(messenger.messages_for(&a), vec!["hello a".to_string()]);
    }

    #[tokio::test]
    async fn test_fail_on_send() {
        let messenger = InMemorySupplierMessenger::new();
        messenger.set_fail_on_send(true);

        let result = messenger.send(&SupplierId::new("SUP-A"), "hello").await;
        assert!(matches!(result, Err(SagaError::Messaging(_))));
        assert!(messenger.sent().is_empty());
    }
}
