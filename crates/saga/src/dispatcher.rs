//! Query dispatch: one supplier query per (shortfall item, eligible supplier).

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use common::{AggregateId, ProductId, SupplierId};
use domain::{DispatchQuery, DispatchedQuery, EscalationKind, OrderError, OrderStatus, order_number};
use event_store::EventStore;
use serde::Serialize;

use crate::context::SagaContext;
use crate::error::{Result, SagaError};
use crate::messages;

/// What one dispatch round did for a fulfillment group.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub product_id: ProductId,
    /// Units each new query asks for.
    pub quantity: u32,
    pub dispatched: Vec<DispatchedQuery>,
    /// Suppliers skipped because they already hold a pending query.
    pub skipped: Vec<SupplierId>,
    /// True when this round raised the `Unsourceable` escalation.
    pub escalated: bool,
}

impl DispatchOutcome {
    fn empty(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
            dispatched: Vec::new(),
            skipped: Vec::new(),
            escalated: false,
        }
    }
}

/// Creates supplier queries for a group's unmet need.
pub struct QueryDispatcher<S: EventStore> {
    ctx: Arc<SagaContext<S>>,
}

impl<S: EventStore> QueryDispatcher<S> {
    pub(crate) fn new(ctx: Arc<SagaContext<S>>) -> Self {
        Self { ctx }
    }

    /// Asks every eligible supplier without a pending query for the group's
    /// current remaining need.
    #[tracing::instrument(skip(self))]
    pub async fn dispatch_group(
        &self,
        order_id: AggregateId,
        product_id: &ProductId,
    ) -> Result<DispatchOutcome> {
        let ctx = &self.ctx;
        let guard = ctx.locks.lock(order_id, product_id).await;

        let order = ctx
            .orders
            .get_order(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))?;
        if order.status() != OrderStatus::AwaitingStock {
            return Err(SagaError::OrderNotReady(format!(
                "order is {}, suppliers are only asked while it awaits stock",
                order.status()
            )));
        }
        let group = order
            .group(product_id)
            .ok_or_else(|| OrderError::NoShortfall {
                product_id: product_id.clone(),
            })
            .map_err(domain::DomainError::from)?;

        let product = ctx
            .collaborators
            .inventory
            .snapshot(product_id)
            .await?
            .ok_or_else(|| SagaError::ProductNotFound(product_id.clone()))?;

        let tally = ctx.tally(group).await?;
        let need = tally.remaining_need();
        let mut outcome = DispatchOutcome::empty(product_id.clone(), need);
        if need == 0 {
            tracing::debug!("group already covered, nothing to dispatch");
            return Ok(outcome);
        }

        let eligible = ctx.collaborators.suppliers.find(&product.category).await?;
        if eligible.is_empty() {
            drop(guard);
            let detail = format!("no active supplier carries category '{}'", product.category);
            outcome.escalated = ctx
                .escalate(order_id, product_id, EscalationKind::Unsourceable, &detail)
                .await?;
            return Ok(outcome);
        }

        let busy: BTreeSet<&SupplierId> = tally.pending.iter().map(|p| &p.supplier_id).collect();
        let (skipped, fresh): (Vec<SupplierId>, Vec<SupplierId>) = eligible
            .into_iter()
            .partition(|supplier_id| busy.contains(supplier_id));
        outcome.skipped = skipped;
        if fresh.is_empty() {
            return Ok(outcome);
        }

        let planned: Vec<DispatchedQuery> = fresh
            .into_iter()
            .map(|supplier_id| DispatchedQuery {
                query_id: AggregateId::new(),
                supplier_id,
            })
            .collect();

        // Ids go on the order first; a query is never written without one.
        ctx.orders
            .record_dispatch(order_id, product_id, planned.clone())
            .await?;

        let expires_at = Utc::now() + ctx.config.query_ttl;
        for query in &planned {
            ctx.queries
                .dispatch(DispatchQuery {
                    query_id: query.query_id,
                    order_id,
                    product_id: product_id.clone(),
                    supplier_id: query.supplier_id.clone(),
                    quantity: need,
                    expires_at,
                })
                .await?;
        }
        drop(guard);

        metrics::counter!("supplier_queries_dispatched_total").increment(planned.len() as u64);
        tracing::info!(
            %order_id,
            %product_id,
            quantity = need,
            suppliers = planned.len(),
            "supplier queries dispatched"
        );

        let number = order_number(order_id);
        for query in &planned {
            let text = messages::stock_request(
                &query.supplier_id,
                &product.name,
                need,
                &number,
                query.query_id,
                expires_at,
            );
            ctx.send_to_supplier(&query.supplier_id, &text).await;
        }

        outcome.dispatched = planned;
        Ok(outcome)
    }
}
