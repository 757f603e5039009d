//! Facade wiring the fulfillment saga together.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{AggregateId, ProductId};
use domain::{CancelOrder, CustomerId, PlaceOrder, RegisterProduct};
use event_store::EventStore;
use serde::Deserialize;

use crate::config::SagaConfig;
use crate::context::SagaContext;
use crate::dispatcher::{DispatchOutcome, QueryDispatcher};
use crate::error::{Result, SagaError, lost_terminal_race};
use crate::expiry::{ExpirySweeper, SweepReport};
use crate::messages;
use crate::reconciler::{ResponseOutcome, ResponseReconciler, ResponseSubmission};
use crate::services::{Collaborators, ProductSnapshot};
use crate::settlement::SettlementEngine;
use crate::shortage::{OrderLine, ShortageDetector};
use crate::status::{OrderStatusView, QueryView};

/// A customer's order as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub customer_id: CustomerId,
    pub lines: Vec<OrderLine>,
}

impl PlaceOrderRequest {
    pub fn new(customer_id: CustomerId, lines: Vec<OrderLine>) -> Self {
        Self { customer_id, lines }
    }
}

/// Entry point of the fulfillment saga.
///
/// Orders go in through [`place_order`](Self::place_order), supplier answers
/// through [`submit_supplier_response`](Self::submit_supplier_response).
/// Every component shares the same event store, so the coordinator can be
/// cloned into as many tasks as needed behind an `Arc`.
pub struct FulfillmentCoordinator<S: EventStore> {
    ctx: Arc<SagaContext<S>>,
    detector: ShortageDetector,
    dispatcher: QueryDispatcher<S>,
    settlement: Arc<SettlementEngine<S>>,
    reconciler: ResponseReconciler<S>,
    sweeper: Arc<ExpirySweeper<S>>,
}

impl<S> FulfillmentCoordinator<S>
where
    S: EventStore + Clone + 'static,
{
    pub fn new(store: S, collaborators: Collaborators, config: SagaConfig) -> Self {
        let detector = ShortageDetector::new(Arc::clone(&collaborators.inventory));
        let ctx = Arc::new(SagaContext::new(store, collaborators, config));
        let settlement = Arc::new(SettlementEngine::new(Arc::clone(&ctx)));

        Self {
            detector,
            dispatcher: QueryDispatcher::new(Arc::clone(&ctx)),
            reconciler: ResponseReconciler::new(Arc::clone(&ctx), Arc::clone(&settlement)),
            sweeper: Arc::new(ExpirySweeper::new(Arc::clone(&ctx), Arc::clone(&settlement))),
            settlement,
            ctx,
        }
    }

    pub fn config(&self) -> &SagaConfig {
        &self.ctx.config
    }

    /// The background sweeper, for [`ExpirySweeper::spawn`].
    pub fn expiry_sweeper(&self) -> Arc<ExpirySweeper<S>> {
        Arc::clone(&self.sweeper)
    }

    #[tracing::instrument(skip(self), fields(product_id = %cmd.product_id))]
    pub async fn register_product(&self, cmd: RegisterProduct) -> Result<ProductSnapshot> {
        self.ctx.collaborators.inventory.register(cmd).await
    }

    /// Places an order: reserves stock, then asks suppliers for every
    /// shortfall. An order fully covered by stock stays Pending.
    #[tracing::instrument(skip(self, request), fields(customer_id = ?request.customer_id))]
    pub async fn place_order(&self, request: PlaceOrderRequest) -> Result<OrderStatusView> {
        let order_id = AggregateId::new();
        let assessment = self.detector.assess(order_id, &request.lines).await?;

        let default_days = i64::from(self.ctx.config.default_lead_time_days);
        let estimate_days = if assessment.has_shortfall() {
            default_days * 2
        } else {
            default_days
        };
        let cmd = PlaceOrder::new(order_id, request.customer_id, assessment.items)
            .with_estimated_delivery(Utc::now() + Duration::days(estimate_days));
        self.ctx.orders.place_order(cmd).await?;

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(
            %order_id,
            shortfalls = assessment.categories.len(),
            "order placed"
        );

        for product_id in assessment.categories.keys() {
            self.dispatcher.dispatch_group(order_id, product_id).await?;
        }

        self.settlement.status(order_id).await
    }

    /// Reconciles one supplier response. Idempotent per query id.
    pub async fn submit_supplier_response(
        &self,
        submission: ResponseSubmission,
    ) -> Result<ResponseOutcome> {
        self.reconciler.submit(submission).await
    }

    pub async fn get_order_status(&self, order_id: AggregateId) -> Result<OrderStatusView> {
        self.settlement.status(order_id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_query(&self, query_id: AggregateId) -> Result<QueryView> {
        let query = self
            .ctx
            .queries
            .get_query(query_id)
            .await?
            .ok_or(SagaError::QueryNotFound(query_id))?;
        Ok(QueryView::from_query(query_id, &query))
    }

    /// Asks suppliers again for a group whose need is still open.
    pub async fn redispatch(
        &self,
        order_id: AggregateId,
        product_id: &ProductId,
    ) -> Result<DispatchOutcome> {
        self.dispatcher.dispatch_group(order_id, product_id).await
    }

    /// Cancels an order that is Pending or AwaitingStock, withdrawing its
    /// open supplier queries. Reserved stock stays where it is.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: AggregateId, reason: &str) -> Result<OrderStatusView> {
        let ctx = &self.ctx;
        if ctx.orders.get_order(order_id).await?.is_none() {
            return Err(SagaError::OrderNotFound(order_id));
        }

        let result = ctx
            .orders
            .cancel_order(CancelOrder::new(order_id, reason))
            .await?;
        let order = result.aggregate;
        let number = order.order_number();
        let query_reason = format!("Order cancelled: {reason}");

        let mut withdrawn = Vec::new();
        for group in order.groups() {
            let product_name = order
                .get_item(&group.product_id)
                .map_or_else(|| group.product_id.to_string(), |item| item.product_name.clone());

            let guard = ctx.locks.lock(order_id, &group.product_id).await;
            let tally = ctx.tally(group).await?;
            for pending in &tally.pending {
                match ctx.queries.cancel(pending.query_id, &query_reason).await {
                    Ok(_) => withdrawn.push((
                        pending.supplier_id.clone(),
                        messages::request_withdrawn(&product_name, &number),
                    )),
                    Err(e) => {
                        let e = SagaError::from(e);
                        if !lost_terminal_race(&e) {
                            return Err(e);
                        }
                    }
                }
            }
            drop(guard);
        }

        for (supplier_id, text) in &withdrawn {
            ctx.send_to_supplier(supplier_id, text).await;
        }

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(%order_id, withdrawn = withdrawn.len(), reason, "order cancelled");

        self.settlement.status(order_id).await
    }

    /// Expires overdue queries as of `now`, then re-settles their orders.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        self.sweeper.sweep(now).await
    }
}
