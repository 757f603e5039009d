//! Order service providing a simplified API for order operations.

use chrono::{DateTime, Utc};
use common::{AggregateId, ProductId};
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{CancelOrder, DispatchedQuery, EscalationKind, Order, PlaceOrder};

/// Service for managing orders.
///
/// Placement appends to a fresh stream. Every later change is a
/// compare-and-set loop, so concurrent settlement passes re-decide against
/// each other's writes.
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
}

impl<S: EventStore> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<CommandResult<Order>, DomainError> {
        let aggregate_id = cmd.aggregate_id();
        self.handler
            .execute(aggregate_id, |order| {
                order.place(
                    cmd.order_id,
                    cmd.customer_id,
                    cmd.items,
                    cmd.estimated_delivery,
                )
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        self.handler.load_existing(order_id).await
    }

    #[tracing::instrument(skip(self, queries), fields(count = queries.len()))]
    pub async fn record_dispatch(
        &self,
        order_id: AggregateId,
        product_id: &ProductId,
        queries: Vec<DispatchedQuery>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_with_retry(order_id, |order| {
                order.record_dispatch(product_id, queries.clone())
            })
            .await
    }

    /// Records an escalation. The result carries no events when this kind
    /// was already raised for the group.
    #[tracing::instrument(skip(self))]
    pub async fn escalate(
        &self,
        order_id: AggregateId,
        product_id: &ProductId,
        kind: EscalationKind,
        detail: &str,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_with_retry(order_id, |order| order.escalate(product_id, kind, detail))
            .await
    }

    /// Attempts the AwaitingStock to Fulfilled transition. The result carries
    /// the `OrderFulfilled` event only for the caller that made it.
    #[tracing::instrument(skip(self))]
    pub async fn fulfill(
        &self,
        order_id: AggregateId,
        lead_time_days: u32,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_with_retry(order_id, |order| order.fulfill(lead_time_days, now))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn record_notified(
        &self,
        order_id: AggregateId,
        attempts: u32,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_with_retry(order_id, |order| order.record_notified(attempts))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn record_notification_failed(
        &self,
        order_id: AggregateId,
        attempts: u32,
        error: &str,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_with_retry(order_id, |order| {
                order.record_notification_failed(attempts, error)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn claim_notification_retry(
        &self,
        order_id: AggregateId,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_with_retry(order_id, |order| order.claim_notification_retry())
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, cmd: CancelOrder) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_with_retry(cmd.order_id, |order| order.cancel(&cmd.reason))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::SupplierId;
    use event_store::InMemoryEventStore;

    use super::*;
    use crate::aggregate::Aggregate;
    use crate::order::{CustomerId, Money, NotificationState, OrderItem, OrderStatus};

    async fn placed_short(service: &OrderService<InMemoryEventStore>) -> AggregateId {
        let order_id = AggregateId::new();
        service
            .place_order(PlaceOrder::new(
                order_id,
                CustomerId::new(),
                vec![OrderItem::new("SKU-1", "Widget", 10, Money::from_cents(100)).with_reserved(4)],
            ))
            .await
            .unwrap();
        order_id
    }

    #[tokio::test]
    async fn test_place_order() {
        let service = OrderService::new(InMemoryEventStore::new());
        let order_id = placed_short(&service).await;

        let order = service.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.id(), Some(order_id));
        assert_eq!(order.status(), OrderStatus::AwaitingStock);
        assert_eq!(order.group(&ProductId::new("SKU-1")).unwrap().needed, 6);
    }

    #[tokio::test]
    async fn test_get_unknown_order() {
        let service = OrderService::new(InMemoryEventStore::new());
        assert!(service.get_order(AggregateId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_dispatch_and_cancel() {
        let service = OrderService::new(InMemoryEventStore::new());
        let order_id = placed_short(&service).await;
        let sku = ProductId::new("SKU-1");

        let result = service
            .record_dispatch(
                order_id,
                &sku,
                vec![DispatchedQuery {
                    query_id: AggregateId::new(),
                    supplier_id: SupplierId::new("SUP-1"),
                }],
            )
            .await
            .unwrap();
        assert_eq!(result.aggregate.group(&sku).unwrap().queries.len(), 1);

        let result = service
            .cancel_order(CancelOrder::new(order_id, "duplicate order"))
            .await
            .unwrap();
        assert_eq!(result.aggregate.status(), OrderStatus::Cancelled);
        assert_eq!(result.aggregate.cancel_reason(), Some("duplicate order"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fulfill_has_one_winner() {
        let service = Arc::new(OrderService::new(InMemoryEventStore::new()));
        let order_id = placed_short(&service).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service.fulfill(order_id, 5, Utc::now()).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if !handle.await.unwrap().events.is_empty() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        let order = service.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::Fulfilled);
        assert_eq!(order.notification(), NotificationState::Pending);
    }
}
