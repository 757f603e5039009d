//! Operations board: where every order stands and what needs a human.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, ProductId};
use domain::{CustomerId, EscalationKind, Money, NotificationState, OrderEvent, OrderStatus};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

#[derive(Debug, Clone, Serialize)]
pub struct EscalationEntry {
    pub product_id: ProductId,
    pub kind: EscalationKind,
    pub detail: String,
    pub escalated_at: DateTime<Utc>,
}

/// One row on the board.
#[derive(Debug, Clone, Serialize)]
pub struct OrderCard {
    pub order_id: AggregateId,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub total_amount: Money,
    /// Products with a recorded shortfall.
    pub short_products: BTreeSet<ProductId>,
    pub queries_dispatched: usize,
    pub escalations: Vec<EscalationEntry>,
    pub notification: NotificationState,
    pub notification_error: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub placed_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

/// Order counts per status plus the two things operators act on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BoardSummary {
    pub pending: usize,
    pub awaiting_stock: usize,
    pub fulfilled: usize,
    pub cancelled: usize,
    pub escalated: usize,
    pub notifications_failed: usize,
}

struct OrderBoardState {
    orders: HashMap<AggregateId, OrderCard>,
    position: ProjectionPosition,
}

#[derive(Clone)]
pub struct OrderBoardView {
    state: Arc<RwLock<OrderBoardState>>,
}

impl OrderBoardView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(OrderBoardState {
                orders: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    pub async fn get(&self, order_id: AggregateId) -> Option<OrderCard> {
        self.state.read().await.orders.get(&order_id).cloned()
    }

    pub async fn summary(&self) -> BoardSummary {
        let state = self.state.read().await;
        let mut summary = BoardSummary::default();
        for card in state.orders.values() {
            match card.status {
                OrderStatus::Pending => summary.pending += 1,
                OrderStatus::AwaitingStock => summary.awaiting_stock += 1,
                OrderStatus::Fulfilled => summary.fulfilled += 1,
                OrderStatus::Cancelled => summary.cancelled += 1,
            }
            if !card.escalations.is_empty() && !card.status.is_terminal() {
                summary.escalated += 1;
            }
            if card.notification == NotificationState::Failed {
                summary.notifications_failed += 1;
            }
        }
        summary
    }

    /// Orders waiting on suppliers, oldest first.
    pub async fn awaiting_stock(&self) -> Vec<OrderCard> {
        self.select(|card| card.status == OrderStatus::AwaitingStock)
            .await
    }

    /// Open orders with at least one escalation.
    pub async fn escalated(&self) -> Vec<OrderCard> {
        self.select(|card| !card.escalations.is_empty() && !card.status.is_terminal())
            .await
    }

    /// Fulfilled orders whose customer message has not gone out.
    pub async fn failed_notifications(&self) -> Vec<OrderCard> {
        self.select(|card| card.notification == NotificationState::Failed)
            .await
    }

    async fn select(&self, keep: impl Fn(&OrderCard) -> bool) -> Vec<OrderCard> {
        let state = self.state.read().await;
        let mut cards: Vec<_> = state.orders.values().filter(|c| keep(c)).cloned().collect();
        cards.sort_by_key(|c| c.placed_at);
        cards
    }
}

impl Default for OrderBoardView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for OrderBoardView {
    fn name(&self) -> &'static str {
        "OrderBoardView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        state.position = state.position.advance_to(event.position);
        if event.aggregate_type != "Order" {
            return Ok(());
        }

        let order_event: OrderEvent = serde_json::from_value(event.payload.clone())?;
        let order_id = event.aggregate_id;

        if let OrderEvent::OrderPlaced(data) = order_event {
            state.orders.insert(
                order_id,
                OrderCard {
                    order_id,
                    customer_id: data.customer_id,
                    status: OrderStatus::Pending,
                    total_amount: data.total_amount,
                    short_products: BTreeSet::new(),
                    queries_dispatched: 0,
                    escalations: Vec::new(),
                    notification: NotificationState::NotRequired,
                    notification_error: None,
                    estimated_delivery: data.estimated_delivery,
                    placed_at: data.placed_at,
                    fulfilled_at: None,
                },
            );
            return Ok(());
        }

        let Some(card) = state.orders.get_mut(&order_id) else {
            tracing::warn!(%order_id, event_type = %event.event_type, "event for unknown order");
            return Ok(());
        };

        match order_event {
            OrderEvent::OrderPlaced(_) => {}
            OrderEvent::ShortfallRecorded(data) => {
                card.short_products.insert(data.product_id);
                card.status = OrderStatus::AwaitingStock;
            }
            OrderEvent::QueriesDispatched(data) => {
                card.queries_dispatched += data.queries.len();
            }
            OrderEvent::SourcingEscalated(data) => {
                card.escalations.push(EscalationEntry {
                    product_id: data.product_id,
                    kind: data.kind,
                    detail: data.detail,
                    escalated_at: data.escalated_at,
                });
            }
            OrderEvent::OrderFulfilled(data) => {
                card.status = OrderStatus::Fulfilled;
                card.notification = NotificationState::Pending;
                card.estimated_delivery = Some(data.estimated_delivery);
                card.fulfilled_at = Some(data.fulfilled_at);
            }
            OrderEvent::CustomerNotified(_) => {
                card.notification = NotificationState::Delivered;
                card.notification_error = None;
            }
            OrderEvent::CustomerNotificationFailed(data) => {
                card.notification = NotificationState::Failed;
                card.notification_error = Some(data.error);
            }
            OrderEvent::NotificationRetryClaimed(_) => {
                card.notification = NotificationState::Pending;
            }
            OrderEvent::OrderCancelled(_) => {
                card.status = OrderStatus::Cancelled;
            }
        }

        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.orders.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for OrderBoardView {
    fn name(&self) -> &'static str {
        "OrderBoardView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.orders.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use domain::DomainEvent;
    use event_store::Version;

    use super::*;

    struct Feed {
        order_id: AggregateId,
        version: i64,
    }

    impl Feed {
        fn new() -> Self {
            Self {
                order_id: AggregateId::new(),
                version: 0,
            }
        }

        fn next(&mut self, event: &OrderEvent) -> EventEnvelope {
            self.version += 1;
            let mut env = EventEnvelope::builder()
                .aggregate_id(self.order_id)
                .aggregate_type("Order")
                .event_type(event.event_type())
                .version(Version::new(self.version))
                .payload(event)
                .unwrap()
                .build()
                .unwrap();
            env.position = self.version as u64;
            env
        }
    }

    fn placed(order_id: AggregateId) -> OrderEvent {
        OrderEvent::order_placed(order_id, CustomerId::new(), Vec::new(), None)
    }

    #[tokio::test]
    async fn shortfall_moves_order_to_awaiting_stock() {
        let view = OrderBoardView::new();
        let mut feed = Feed::new();

        view.handle(&feed.next(&placed(feed.order_id))).await.unwrap();
        assert_eq!(view.summary().await.pending, 1);

        let shortfall = OrderEvent::shortfall_recorded(ProductId::new("RING-22K"), 4);
        view.handle(&feed.next(&shortfall)).await.unwrap();

        let summary = view.summary().await;
        assert_eq!(summary.pending, 0);
        assert_eq!(summary.awaiting_stock, 1);
        assert_eq!(view.awaiting_stock().await[0].order_id, feed.order_id);
    }

    #[tokio::test]
    async fn escalations_and_failed_notifications_are_listed() {
        let view = OrderBoardView::new();
        let mut feed = Feed::new();
        let sku = ProductId::new("RING-22K");

        view.handle(&feed.next(&placed(feed.order_id))).await.unwrap();
        view.handle(&feed.next(&OrderEvent::shortfall_recorded(sku.clone(), 4)))
            .await
            .unwrap();
        let escalated = OrderEvent::sourcing_escalated(
            sku,
            EscalationKind::AllSuppliersDeclined,
            "every supplier declined",
        );
        view.handle(&feed.next(&escalated)).await.unwrap();
        assert_eq!(view.escalated().await.len(), 1);

        view.handle(&feed.next(&OrderEvent::order_fulfilled(5, Utc::now())))
            .await
            .unwrap();
        view.handle(&feed.next(&OrderEvent::customer_notification_failed(3, "smtp down")))
            .await
            .unwrap();

        let summary = view.summary().await;
        assert_eq!(summary.fulfilled, 1);
        assert_eq!(summary.escalated, 0);
        assert_eq!(summary.notifications_failed, 1);

        let card = view.failed_notifications().await.remove(0);
        assert_eq!(card.notification_error.as_deref(), Some("smtp down"));
    }
}
