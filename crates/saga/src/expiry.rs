//! Expiry of unanswered supplier queries.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::StockQueryEvent;
use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::context::SagaContext;
use crate::error::{Result, SagaError, lost_terminal_race};
use crate::settlement::SettlementEngine;

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired: Vec<AggregateId>,
    /// Orders re-settled because one of their queries expired.
    pub orders_checked: usize,
    pub notifications_retried: usize,
}

/// Deadlines of queries still waiting for a reply.
///
/// Fed incrementally from the store's global stream, so a sweep only reads
/// what was appended since the previous one.
#[derive(Debug, Default)]
struct PendingDeadlines {
    position: u64,
    deadlines: HashMap<AggregateId, DateTime<Utc>>,
}

impl PendingDeadlines {
    async fn refresh<S: EventStore>(&mut self, store: &S) -> Result<()> {
        let mut stream = store.stream_events_after(self.position).await?;
        while let Some(envelope) = stream.next().await {
            self.apply(&envelope?)?;
        }
        Ok(())
    }

    fn apply(&mut self, envelope: &EventEnvelope) -> Result<()> {
        if envelope.aggregate_type == "StockQuery" {
            match envelope.decode::<StockQueryEvent>()? {
                StockQueryEvent::QueryDispatched(data) => {
                    self.deadlines.insert(envelope.aggregate_id, data.expires_at);
                }
                StockQueryEvent::SupplierConfirmed(_)
                | StockQueryEvent::SupplierDeclined(_)
                | StockQueryEvent::QueryCancelled(_)
                | StockQueryEvent::QueryExpired(_) => {
                    self.deadlines.remove(&envelope.aggregate_id);
                }
                StockQueryEvent::RequirementReduced(_) | StockQueryEvent::ResponseIgnored(_) => {}
            }
        }
        self.position = self.position.max(envelope.position);
        Ok(())
    }

    fn overdue(&self, now: DateTime<Utc>) -> Vec<AggregateId> {
        let mut overdue: Vec<_> = self
            .deadlines
            .iter()
            .filter(|(_, expires_at)| **expires_at <= now)
            .map(|(query_id, _)| *query_id)
            .collect();
        overdue.sort();
        overdue
    }
}

/// Closes overdue queries and retries failed customer notifications.
pub struct ExpirySweeper<S: EventStore> {
    ctx: Arc<SagaContext<S>>,
    settlement: Arc<SettlementEngine<S>>,
    pending: Mutex<PendingDeadlines>,
}

impl<S: EventStore + 'static> ExpirySweeper<S> {
    pub(crate) fn new(ctx: Arc<SagaContext<S>>, settlement: Arc<SettlementEngine<S>>) -> Self {
        Self {
            ctx,
            settlement,
            pending: Mutex::new(PendingDeadlines::default()),
        }
    }

    /// Expires every pending query whose deadline is at or before `now`.
    ///
    /// Expiry competes with responses through the same compare-and-set, so
    /// a query answered a moment earlier is left alone.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let ctx = &self.ctx;
        let mut report = SweepReport::default();
        let mut affected = BTreeSet::new();

        let overdue = {
            let mut pending = self.pending.lock().await;
            pending.refresh(&ctx.store).await?;
            pending.overdue(now)
        };

        for query_id in overdue {
            let Some(query) = ctx.queries.get_query(query_id).await? else {
                continue;
            };
            if !query.is_overdue(now) {
                continue;
            }

            match ctx.queries.expire(query_id, now).await {
                Ok(_) => {
                    metrics::counter!("queries_expired_total").increment(1);
                    tracing::info!(%query_id, supplier_id = ?query.supplier_id(), "supplier query expired");
                    report.expired.push(query_id);
                    if let Some(order_id) = query.order_id() {
                        affected.insert(order_id);
                    }
                }
                Err(e) => {
                    let e = SagaError::from(e);
                    if !lost_terminal_race(&e) {
                        return Err(e);
                    }
                    tracing::debug!(%query_id, "query answered before expiry");
                }
            }
        }

        for order_id in affected {
            report.orders_checked += 1;
            if let Err(e) = self.settlement.settle(order_id).await {
                tracing::warn!(%order_id, error = %e, "settlement after expiry failed");
            }
        }

        report.notifications_retried = self.settlement.notifier().retry_failed().await?;
        Ok(report)
    }

    /// Runs [`ExpirySweeper::sweep`] every `sweep_interval` until `shutdown`
    /// flips to true or its sender is dropped.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let period = self.ctx.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tracing::info!(interval_secs = period.as_secs(), "expiry sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.sweep(Utc::now()).await {
                            Ok(report) if !report.expired.is_empty() => {
                                tracing::info!(expired = report.expired.len(), "expiry sweep finished");
                            }
                            Ok(_) => {}
                            Err(e) => tracing::error!(error = %e, "expiry sweep failed"),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("expiry sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use common::{ProductId, SupplierId};
    use domain::{DispatchQuery, StockQueryService};
    use event_store::InMemoryEventStore;

    use super::*;

    async fn dispatch(
        queries: &StockQueryService<InMemoryEventStore>,
        expires_at: DateTime<Utc>,
    ) -> AggregateId {
        let query_id = AggregateId::new();
        queries
            .dispatch(DispatchQuery {
                query_id,
                order_id: AggregateId::new(),
                product_id: ProductId::new("RING"),
                supplier_id: SupplierId::new("SUP-A"),
                quantity: 3,
                expires_at,
            })
            .await
            .unwrap();
        query_id
    }

    #[tokio::test]
    async fn deadlines_track_only_open_queries() {
        let store = InMemoryEventStore::new();
        let queries = StockQueryService::new(store.clone());
        let now = Utc::now();

        let early = dispatch(&queries, now + Duration::hours(1)).await;
        let answered = dispatch(&queries, now + Duration::hours(1)).await;
        let late = dispatch(&queries, now + Duration::hours(48)).await;

        let mut pending = PendingDeadlines::default();
        pending.refresh(&store).await.unwrap();
        assert_eq!(pending.deadlines.len(), 3);

        queries.decline(answered).await.unwrap();
        pending.refresh(&store).await.unwrap();

        assert_eq!(pending.overdue(now + Duration::hours(2)), vec![early]);
        assert!(pending.overdue(now).is_empty());
        assert!(pending.deadlines.contains_key(&late));
        assert_eq!(pending.position, 4);
    }
}
