//! Operational escalation channel.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, ProductId};
use domain::EscalationKind;
use serde::Serialize;

use crate::error::SagaError;

/// How urgently staff should look at an escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl From<EscalationKind> for Severity {
    fn from(kind: EscalationKind) -> Self {
        match kind {
            EscalationKind::Unsourceable | EscalationKind::AllSuppliersDeclined => Severity::High,
            EscalationKind::SupplyExhausted | EscalationKind::QueriesExpired => Severity::Medium,
        }
    }
}

/// Raised when automatic sourcing cannot proceed for a fulfillment group.
#[derive(Debug, Clone, Serialize)]
pub struct Escalation {
    pub kind: EscalationKind,
    pub severity: Severity,
    pub order_id: AggregateId,
    pub product_id: ProductId,
    pub detail: String,
    pub raised_at: DateTime<Utc>,
}

impl Escalation {
    pub fn new(
        kind: EscalationKind,
        order_id: AggregateId,
        product_id: ProductId,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity: kind.into(),
            order_id,
            product_id,
            detail: detail.into(),
            raised_at: Utc::now(),
        }
    }
}

/// Alert channel for staff.
#[async_trait]
pub trait EscalationSink: Send + Sync {
    async fn raise(&self, escalation: Escalation) -> Result<(), SagaError>;
}

/// Writes escalations to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEscalationSink;

#[async_trait]
impl EscalationSink for LoggingEscalationSink {
    async fn raise(&self, escalation: Escalation) -> Result<(), SagaError> {
        tracing::warn!(
            kind = %escalation.kind,
            severity = ?escalation.severity,
            order_id = %escalation.order_id,
            product_id = %escalation.product_id,
            detail = %escalation.detail,
            "sourcing escalated"
        );
        Ok(())
    }
}

/// In-memory escalation log for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEscalationLog {
    raised: Arc<RwLock<Vec<Escalation>>>,
}

impl InMemoryEscalationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn escalations(&self) -> Vec<Escalation> {
        self.raised
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn escalations_for(&self, order_id: AggregateId) -> Vec<Escalation> {
        self.raised
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|escalation| escalation.order_id == order_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EscalationSink for InMemoryEscalationLog {
    async fn raise(&self, escalation: Escalation) -> Result<(), SagaError> {
        self.raised
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(escalation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_keeps_escalations_per_order() {
        let log = InMemoryEscalationLog::new();
        let order_id = AggregateId::new();

        log.raise(Escalation::new(
            EscalationKind::Unsourceable,
            order_id,
            ProductId::new("SKU-1"),
            "no supplier carries toys",
        ))
        .await
        .unwrap();

        let raised = log.escalations_for(order_id);
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].severity, Severity::High);
        assert!(log.escalations_for(AggregateId::new()).is_empty());
    }

    #[test]
    fn test_severity_by_kind() {
        assert_eq!(Severity::from(EscalationKind::SupplyExhausted), Severity::Medium);
        assert_eq!(Severity::from(EscalationKind::AllSuppliersDeclined), Severity::High);
    }
}
