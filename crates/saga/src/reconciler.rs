//! Supplier response reconciliation.

use std::sync::Arc;
use std::time::Instant;

use common::{AggregateId, ProductId, SupplierId};
use domain::{Money, Order, OrderError, OrderStatus, QueryStatus, StockQuery, order_number};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use crate::context::SagaContext;
use crate::error::{Result, SagaError, lost_terminal_race};
use crate::messages;
use crate::settlement::SettlementEngine;

/// A supplier's answer to one query, already extracted into typed fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResponseSubmission {
    pub query_id: AggregateId,
    pub available: bool,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub lead_time_days: Option<u32>,
}

impl ResponseSubmission {
    pub fn available(query_id: AggregateId, quantity: u32) -> Self {
        Self {
            query_id,
            available: true,
            quantity,
            price: None,
            lead_time_days: None,
        }
    }

    pub fn unavailable(query_id: AggregateId) -> Self {
        Self {
            query_id,
            available: false,
            quantity: 0,
            price: None,
            lead_time_days: None,
        }
    }

    pub fn with_price(mut self, price: Money) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_lead_time(mut self, days: u32) -> Self {
        self.lead_time_days = Some(days);
        self
    }
}

/// What a response did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResponseOutcome {
    /// Units were credited to inventory.
    Credited {
        query_id: AggregateId,
        offered: u32,
        credited: u32,
        /// Units of the group still to be sourced afterwards.
        remaining_need: u32,
    },
    /// The supplier has no stock.
    Declined { query_id: AggregateId },
    /// The need was already covered, or the order is no longer waiting; the
    /// query was cancelled without credit.
    Superseded { query_id: AggregateId },
    /// The query was closed before this response; recorded for audit only.
    AlreadyTerminal {
        query_id: AggregateId,
        status: QueryStatus,
    },
}

impl ResponseOutcome {
    fn label(&self) -> &'static str {
        match self {
            ResponseOutcome::Credited { .. } => "credited",
            ResponseOutcome::Declined { .. } => "declined",
            ResponseOutcome::Superseded { .. } => "superseded",
            ResponseOutcome::AlreadyTerminal { .. } => "ignored",
        }
    }
}

/// Result of the locked part of reconciliation.
enum Decision {
    Decided(ResponseOutcome),
    /// Expiry closed the query between the read and the write.
    Closed,
}

/// Applies supplier responses one group at a time.
pub struct ResponseReconciler<S: EventStore> {
    ctx: Arc<SagaContext<S>>,
    settlement: Arc<SettlementEngine<S>>,
}

impl<S: EventStore> ResponseReconciler<S> {
    pub(crate) fn new(ctx: Arc<SagaContext<S>>, settlement: Arc<SettlementEngine<S>>) -> Self {
        Self { ctx, settlement }
    }

    /// Reconciles one response. Idempotent per query: a repeat of an applied
    /// response is recorded and changes nothing else.
    #[tracing::instrument(skip(self, submission), fields(query_id = %submission.query_id))]
    pub async fn submit(&self, submission: ResponseSubmission) -> Result<ResponseOutcome> {
        let started = Instant::now();
        let query_id = submission.query_id;

        let query = self.load(query_id).await?;
        let (Some(order_id), Some(product_id)) = (query.order_id(), query.product_id().cloned())
        else {
            return Err(SagaError::QueryNotFound(query_id));
        };

        let outcome = if query.status().is_terminal() {
            self.ignore(&query, &product_id, &submission).await?
        } else {
            let guard = self.ctx.locks.lock(order_id, &product_id).await;
            let mut followups = Vec::new();
            let decision = self
                .decide(order_id, &product_id, &submission, &mut followups)
                .await?;
            drop(guard);

            for (supplier_id, text) in &followups {
                self.ctx.send_to_supplier(supplier_id, text).await;
            }

            match decision {
                Decision::Decided(outcome) => outcome,
                Decision::Closed => {
                    let query = self.load(query_id).await?;
                    self.ignore(&query, &product_id, &submission).await?
                }
            }
        };

        metrics::counter!("supplier_responses_total", "outcome" => outcome.label()).increment(1);
        tracing::info!(%order_id, %product_id, outcome = outcome.label(), "supplier response reconciled");

        let settled = self.settlement.settle(order_id).await;
        metrics::histogram!("reconcile_duration_seconds").record(started.elapsed().as_secs_f64());
        settled?;

        Ok(outcome)
    }

    async fn load(&self, query_id: AggregateId) -> Result<StockQuery> {
        self.ctx.queries.get_query(query_id).await?.ok_or_else(|| {
            tracing::warn!(%query_id, "response for unknown query rejected");
            SagaError::QueryNotFound(query_id)
        })
    }

    /// Runs with the group lock held. Supplier messages are collected into
    /// `followups` and sent after the lock is released.
    async fn decide(
        &self,
        order_id: AggregateId,
        product_id: &ProductId,
        submission: &ResponseSubmission,
        followups: &mut Vec<(SupplierId, String)>,
    ) -> Result<Decision> {
        let ctx = &self.ctx;
        let query_id = submission.query_id;

        let query = self.load(query_id).await?;
        if query.status().is_terminal() {
            return Ok(Decision::Closed);
        }
        let Some(responder) = query.supplier_id().cloned() else {
            return Err(SagaError::QueryNotFound(query_id));
        };

        let order = ctx
            .orders
            .get_order(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))?;
        let product_name = product_name(&order, product_id);
        let number = order_number(order_id);

        if order.status() != OrderStatus::AwaitingStock {
            let reason = format!("Order is {}", order.status());
            return close(ctx.queries.cancel(query_id, &reason).await.map_err(Into::into), || {
                followups.push((responder.clone(), messages::request_withdrawn(&product_name, &number)));
                ResponseOutcome::Superseded { query_id }
            });
        }

        if !submission.available || submission.quantity == 0 {
            return close(ctx.queries.decline(query_id).await.map_err(Into::into), || {
                ResponseOutcome::Declined { query_id }
            });
        }

        let group = order
            .group(product_id)
            .ok_or_else(|| OrderError::NoShortfall {
                product_id: product_id.clone(),
            })
            .map_err(domain::DomainError::from)?;
        let tally = ctx.tally(group).await?;

        let need = query.remaining().min(tally.remaining_need());
        if need == 0 {
            let reason = "Requirement already fulfilled";
            return close(ctx.queries.cancel(query_id, reason).await.map_err(Into::into), || {
                followups.push((
                    responder.clone(),
                    messages::requirement_already_met(&product_name, &number),
                ));
                ResponseOutcome::Superseded { query_id }
            });
        }

        let offered = submission.quantity;
        let credited = offered.min(need);
        let confirmed = ctx
            .queries
            .confirm(
                query_id,
                offered,
                credited,
                submission.price,
                submission.lead_time_days,
            )
            .await
            .map_err(SagaError::from);
        if let Err(e) = confirmed {
            return if lost_terminal_race(&e) {
                Ok(Decision::Closed)
            } else {
                Err(e)
            };
        }

        if ctx
            .collaborators
            .inventory
            .credit(product_id, query_id, credited)
            .await?
        {
            metrics::counter!("stock_credited_units_total").increment(u64::from(credited));
        }
        tracing::info!(%order_id, %product_id, supplier_id = %responder, offered, credited, "stock credited");

        let remaining_need = tally.remaining_need() - credited;
        for sibling in tally.pending.iter().filter(|p| p.query_id != query_id) {
            let applied = if remaining_need > 0 {
                ctx.queries
                    .reduce_requirement(sibling.query_id, remaining_need)
                    .await
                    .map(|result| {
                        if !result.events.is_empty() {
                            followups.push((
                                sibling.supplier_id.clone(),
                                messages::requirement_update(
                                    &product_name,
                                    &number,
                                    remaining_need,
                                    sibling.remaining,
                                    &responder,
                                ),
                            ));
                        }
                    })
            } else {
                let reason = format!("Requirement fulfilled by {responder}");
                ctx.queries
                    .cancel(sibling.query_id, &reason)
                    .await
                    .map(|_| {
                        followups.push((
                            sibling.supplier_id.clone(),
                            messages::requirement_fulfilled(&product_name, &responder),
                        ));
                    })
            };

            if let Err(e) = applied.map_err(SagaError::from) {
                if !lost_terminal_race(&e) {
                    return Err(e);
                }
                tracing::debug!(query_id = %sibling.query_id, "sibling closed before cascade");
            }
        }

        Ok(Decision::Decided(ResponseOutcome::Credited {
            query_id,
            offered,
            credited,
            remaining_need,
        }))
    }

    /// Audits a response to a closed query. A duplicate of an accepted
    /// response re-applies its credit, which is a no-op unless the first
    /// attempt failed after the query transition.
    async fn ignore(
        &self,
        query: &StockQuery,
        product_id: &ProductId,
        submission: &ResponseSubmission,
    ) -> Result<ResponseOutcome> {
        let ctx = &self.ctx;
        let query_id = submission.query_id;

        ctx.queries
            .record_ignored(query_id, submission.available, submission.quantity)
            .await?;

        if query.status() == QueryStatus::Available && query.credited() > 0 {
            let healed = ctx
                .collaborators
                .inventory
                .credit(product_id, query_id, query.credited())
                .await?;
            if healed {
                metrics::counter!("stock_credited_units_total")
                    .increment(u64::from(query.credited()));
                tracing::warn!(%query_id, credited = query.credited(), "missing credit re-applied");
            }
        }

        tracing::debug!(%query_id, status = %query.status(), "response to closed query recorded");
        Ok(ResponseOutcome::AlreadyTerminal {
            query_id,
            status: query.status(),
        })
    }
}

fn product_name(order: &Order, product_id: &ProductId) -> String {
    order
        .get_item(product_id)
        .map_or_else(|| product_id.to_string(), |item| item.product_name.clone())
}

/// Maps the result of a terminal transition, treating a lost race with
/// expiry as `Decision::Closed`.
fn close<T>(
    result: Result<T>,
    on_success: impl FnOnce() -> ResponseOutcome,
) -> Result<Decision> {
    match result {
        Ok(_) => Ok(Decision::Decided(on_success())),
        Err(e) if lost_terminal_race(&e) => Ok(Decision::Closed),
        Err(e) => Err(e),
    }
}
