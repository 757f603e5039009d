//! Order settlement: derives the order status from its queries.

use std::sync::Arc;

use chrono::Utc;
use common::AggregateId;
use domain::OrderStatus;
use event_store::EventStore;

use crate::context::SagaContext;
use crate::error::{Result, SagaError};
use crate::notifier::NotificationRelay;
use crate::status::OrderStatusView;

/// Re-scans an order's fulfillment groups and moves it to Fulfilled once
/// every group is covered.
///
/// ```text
/// Pending ──► AwaitingStock ──► Fulfilled
///    │              │
///    └──────────────┴──► Cancelled
/// ```
///
/// Safe to run from any number of tasks at once: the Fulfilled transition is
/// a compare-and-set from AwaitingStock and only its winner notifies.
pub struct SettlementEngine<S: EventStore> {
    ctx: Arc<SagaContext<S>>,
    notifier: NotificationRelay<S>,
}

impl<S: EventStore> SettlementEngine<S> {
    pub(crate) fn new(ctx: Arc<SagaContext<S>>) -> Self {
        Self {
            notifier: NotificationRelay::new(Arc::clone(&ctx)),
            ctx,
        }
    }

    pub fn notifier(&self) -> &NotificationRelay<S> {
        &self.notifier
    }

    /// Recomputes the order and returns its status afterwards.
    ///
    /// Exhausted groups are escalated. If this call made the order
    /// Fulfilled, the customer is notified before it returns.
    #[tracing::instrument(skip(self))]
    pub async fn settle(&self, order_id: AggregateId) -> Result<OrderStatus> {
        let ctx = &self.ctx;
        let order = ctx
            .orders
            .get_order(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))?;
        if order.status() != OrderStatus::AwaitingStock {
            return Ok(order.status());
        }

        let mut covered = true;
        let mut lead_time_days: Option<u32> = None;
        for group in order.groups() {
            let tally = ctx.tally(group).await?;
            if tally.is_satisfied() {
                if let Some(days) = tally.max_lead_time_days {
                    lead_time_days = Some(lead_time_days.map_or(days, |d| d.max(days)));
                }
                continue;
            }

            covered = false;
            if tally.is_exhausted() {
                let kind = tally.exhaustion_kind();
                if !group.has_escalated(kind) {
                    let detail = format!(
                        "{} of {} units sourced and no supplier query is open",
                        tally.credited, tally.needed
                    );
                    ctx.escalate(order_id, &group.product_id, kind, &detail)
                        .await?;
                }
            }
        }

        if !covered {
            return Ok(OrderStatus::AwaitingStock);
        }

        let days = lead_time_days.unwrap_or(ctx.config.default_lead_time_days);
        let result = match ctx.orders.fulfill(order_id, days, Utc::now()).await {
            Ok(result) => result,
            Err(e) => {
                let err = SagaError::from(e);
                if !err.is_invalid_transition() {
                    return Err(err);
                }
                // Cancelled between the scan and the append.
                return Ok(ctx
                    .orders
                    .get_order(order_id)
                    .await?
                    .map_or(OrderStatus::Cancelled, |order| order.status()));
            }
        };

        if result.events.is_empty() {
            return Ok(OrderStatus::Fulfilled);
        }

        metrics::counter!("orders_fulfilled_total").increment(1);
        tracing::info!(%order_id, lead_time_days = days, "order fulfilled");
        self.notifier.deliver(order_id, &result.aggregate).await?;
        Ok(OrderStatus::Fulfilled)
    }

    /// Status of an order with its per-product breakdown.
    #[tracing::instrument(skip(self))]
    pub async fn status(&self, order_id: AggregateId) -> Result<OrderStatusView> {
        let ctx = &self.ctx;
        let order = ctx
            .orders
            .get_order(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))?;

        let mut tallies = Vec::new();
        for group in order.groups() {
            tallies.push((group.product_id.clone(), ctx.tally(group).await?));
        }

        Ok(OrderStatusView::build(order_id, &order, |product_id| {
            tallies
                .iter()
                .find(|(id, _)| id == product_id)
                .map(|(_, tally)| tally.clone())
        }))
    }
}
