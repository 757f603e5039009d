//! Order domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, ProductId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{CustomerId, DispatchedQuery, EscalationKind, Money, OrderItem};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    OrderPlaced(OrderPlacedData),

    /// Stock did not cover an item; opens its fulfillment group.
    ShortfallRecorded(ShortfallRecordedData),

    /// Queries were sent to suppliers for a group.
    QueriesDispatched(QueriesDispatchedData),

    /// Automatic sourcing of a group stalled and operators were alerted.
    SourcingEscalated(SourcingEscalatedData),

    OrderFulfilled(OrderFulfilledData),

    CustomerNotified(CustomerNotifiedData),

    CustomerNotificationFailed(CustomerNotificationFailedData),

    /// A sweeper took ownership of resending a failed notification.
    NotificationRetryClaimed(NotificationRetryClaimedData),

    OrderCancelled(OrderCancelledData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::ShortfallRecorded(_) => "ShortfallRecorded",
            OrderEvent::QueriesDispatched(_) => "QueriesDispatched",
            OrderEvent::SourcingEscalated(_) => "SourcingEscalated",
            OrderEvent::OrderFulfilled(_) => "OrderFulfilled",
            OrderEvent::CustomerNotified(_) => "CustomerNotified",
            OrderEvent::CustomerNotificationFailed(_) => "CustomerNotificationFailed",
            OrderEvent::NotificationRetryClaimed(_) => "NotificationRetryClaimed",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub customer_id: CustomerId,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    /// Provisional estimate given to the customer at placement.
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortfallRecordedData {
    pub product_id: ProductId,
    pub needed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueriesDispatchedData {
    pub product_id: ProductId,
    pub queries: Vec<DispatchedQuery>,
    pub dispatched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcingEscalatedData {
    pub product_id: ProductId,
    pub kind: EscalationKind,
    pub detail: String,
    pub escalated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFulfilledData {
    /// Longest lead time among the suppliers that covered the order.
    pub lead_time_days: u32,
    pub estimated_delivery: DateTime<Utc>,
    pub fulfilled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerNotifiedData {
    pub attempts: u32,
    pub notified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerNotificationFailedData {
    pub attempts: u32,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRetryClaimedData {
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

// Convenience constructors for events
impl OrderEvent {
    pub fn order_placed(
        order_id: AggregateId,
        customer_id: CustomerId,
        items: Vec<OrderItem>,
        estimated_delivery: Option<DateTime<Utc>>,
    ) -> Self {
        let total_amount = items
            .iter()
            .fold(Money::zero(), |total, item| total + item.total_price());
        OrderEvent::OrderPlaced(OrderPlacedData {
            order_id,
            customer_id,
            items,
            total_amount,
            estimated_delivery,
            placed_at: Utc::now(),
        })
    }

    pub fn shortfall_recorded(product_id: ProductId, needed: u32) -> Self {
        OrderEvent::ShortfallRecorded(ShortfallRecordedData { product_id, needed })
    }

    pub fn queries_dispatched(product_id: ProductId, queries: Vec<DispatchedQuery>) -> Self {
        OrderEvent::QueriesDispatched(QueriesDispatchedData {
            product_id,
            queries,
            dispatched_at: Utc::now(),
        })
    }

    pub fn sourcing_escalated(
        product_id: ProductId,
        kind: EscalationKind,
        detail: impl Into<String>,
    ) -> Self {
        OrderEvent::SourcingEscalated(SourcingEscalatedData {
            product_id,
            kind,
            detail: detail.into(),
            escalated_at: Utc::now(),
        })
    }

    pub fn order_fulfilled(lead_time_days: u32, fulfilled_at: DateTime<Utc>) -> Self {
        OrderEvent::OrderFulfilled(OrderFulfilledData {
            lead_time_days,
            estimated_delivery: fulfilled_at + chrono::Duration::days(i64::from(lead_time_days)),
            fulfilled_at,
        })
    }

    pub fn customer_notified(attempts: u32) -> Self {
        OrderEvent::CustomerNotified(CustomerNotifiedData {
            attempts,
            notified_at: Utc::now(),
        })
    }

    pub fn customer_notification_failed(attempts: u32, error: impl Into<String>) -> Self {
        OrderEvent::CustomerNotificationFailed(CustomerNotificationFailedData {
            attempts,
            error: error.into(),
            failed_at: Utc::now(),
        })
    }

    pub fn notification_retry_claimed() -> Self {
        OrderEvent::NotificationRetryClaimed(NotificationRetryClaimedData {
            claimed_at: Utc::now(),
        })
    }

    pub fn order_cancelled(reason: impl Into<String>) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            reason: reason.into(),
            cancelled_at: Utc::now(),
        })
    }
}
