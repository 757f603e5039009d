//! Customer "order ready" notification with bounded retry.

use std::sync::Arc;

use common::AggregateId;
use domain::{DomainError, NotificationState, Order, OrderError};
use event_store::EventStore;

use crate::context::SagaContext;
use crate::error::{Result, SagaError};
use crate::messages;

/// Sends the single "order ready" message of an order.
///
/// Only the caller that won the Fulfilled transition, or the sweeper after
/// claiming a failed notification, reaches [`NotificationRelay::deliver`].
pub struct NotificationRelay<S: EventStore> {
    ctx: Arc<SagaContext<S>>,
}

impl<S: EventStore> NotificationRelay<S> {
    pub(crate) fn new(ctx: Arc<SagaContext<S>>) -> Self {
        Self { ctx }
    }

    /// Sends with up to `notify_max_attempts` tries and records the outcome
    /// on the order. Returns the attempts used.
    #[tracing::instrument(skip(self, order))]
    pub async fn deliver(&self, order_id: AggregateId, order: &Order) -> Result<u32> {
        let ctx = &self.ctx;
        let days = order
            .lead_time_days()
            .unwrap_or(ctx.config.default_lead_time_days);
        let text = messages::order_ready(&order.order_number(), days);
        let max_attempts = ctx.config.notify_max_attempts.max(1);

        let mut last_error = String::new();
        for attempt in 1..=max_attempts {
            match ctx.collaborators.customers.notify(order_id, &text).await {
                Ok(()) => {
                    ctx.orders.record_notified(order_id, attempt).await?;
                    metrics::counter!("customer_notifications_total", "outcome" => "delivered")
                        .increment(1);
                    tracing::info!(%order_id, attempt, "customer notified");
                    return Ok(attempt);
                }
                Err(e) => {
                    tracing::warn!(%order_id, attempt, error = %e, "customer notification attempt failed");
                    last_error = e.to_string();
                    if attempt < max_attempts {
                        tokio::time::sleep(ctx.config.notify_backoff).await;
                    }
                }
            }
        }

        ctx.orders
            .record_notification_failed(order_id, max_attempts, &last_error)
            .await?;
        metrics::counter!("customer_notifications_total", "outcome" => "failed").increment(1);
        tracing::error!(%order_id, attempts = max_attempts, "customer notification failed");

        Err(SagaError::Notification {
            attempts: max_attempts,
            reason: last_error,
        })
    }

    /// Resends every failed notification this caller manages to claim.
    /// Returns how many were delivered.
    #[tracing::instrument(skip(self))]
    pub async fn retry_failed(&self) -> Result<usize> {
        let ctx = &self.ctx;
        let mut delivered = 0;

        for order_id in ctx.store.aggregate_ids("Order").await? {
            let Some(order) = ctx.orders.get_order(order_id).await? else {
                continue;
            };
            if order.notification() != NotificationState::Failed {
                continue;
            }

            let claimed = match ctx.orders.claim_notification_retry(order_id).await {
                Ok(result) => result.aggregate,
                Err(DomainError::Order(OrderError::UnexpectedNotificationState { .. })) => {
                    tracing::debug!(%order_id, "notification retry claimed elsewhere");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            match self.deliver(order_id, &claimed).await {
                Ok(_) => delivered += 1,
                Err(SagaError::Notification { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(delivered)
    }
}
