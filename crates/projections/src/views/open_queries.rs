//! Open supplier queries, the work list of what each supplier still owes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, ProductId, SupplierId};
use domain::StockQueryEvent;
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// A query still waiting on its supplier.
#[derive(Debug, Clone, Serialize)]
pub struct OpenQuery {
    pub query_id: AggregateId,
    pub order_id: AggregateId,
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub requested: u32,
    /// Current requirement after sibling reductions.
    pub remaining: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

struct OpenQueriesState {
    queries: HashMap<AggregateId, OpenQuery>,
    position: ProjectionPosition,
}

/// Pending queries, removed as soon as they reach a terminal status.
#[derive(Clone)]
pub struct OpenQueriesView {
    state: Arc<RwLock<OpenQueriesState>>,
}

impl OpenQueriesView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(OpenQueriesState {
                queries: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    pub async fn get(&self, query_id: AggregateId) -> Option<OpenQuery> {
        self.state.read().await.queries.get(&query_id).cloned()
    }

    /// All open queries, soonest deadline first.
    pub async fn all(&self) -> Vec<OpenQuery> {
        let state = self.state.read().await;
        sorted(state.queries.values().cloned().collect())
    }

    pub async fn for_supplier(&self, supplier_id: &SupplierId) -> Vec<OpenQuery> {
        let state = self.state.read().await;
        sorted(
            state
                .queries
                .values()
                .filter(|q| &q.supplier_id == supplier_id)
                .cloned()
                .collect(),
        )
    }

    pub async fn for_order(&self, order_id: AggregateId) -> Vec<OpenQuery> {
        let state = self.state.read().await;
        sorted(
            state
                .queries
                .values()
                .filter(|q| q.order_id == order_id)
                .cloned()
                .collect(),
        )
    }

    /// Queries whose deadline falls before `at`.
    pub async fn expiring_before(&self, at: DateTime<Utc>) -> Vec<OpenQuery> {
        let state = self.state.read().await;
        sorted(
            state
                .queries
                .values()
                .filter(|q| q.expires_at < at)
                .cloned()
                .collect(),
        )
    }
}

fn sorted(mut queries: Vec<OpenQuery>) -> Vec<OpenQuery> {
    queries.sort_by(|a, b| {
        a.expires_at
            .cmp(&b.expires_at)
            .then_with(|| a.supplier_id.cmp(&b.supplier_id))
    });
    queries
}

impl Default for OpenQueriesView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for OpenQueriesView {
    fn name(&self) -> &'static str {
        "OpenQueriesView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        state.position = state.position.advance_to(event.position);
        if event.aggregate_type != "StockQuery" {
            return Ok(());
        }

        let query_event: StockQueryEvent = serde_json::from_value(event.payload.clone())?;
        let query_id = event.aggregate_id;

        match query_event {
            StockQueryEvent::QueryDispatched(data) => {
                state.queries.insert(
                    query_id,
                    OpenQuery {
                        query_id,
                        order_id: data.order_id,
                        product_id: data.product_id,
                        supplier_id: data.supplier_id,
                        requested: data.quantity,
                        remaining: data.quantity,
                        created_at: data.created_at,
                        expires_at: data.expires_at,
                    },
                );
            }
            StockQueryEvent::RequirementReduced(data) => {
                if let Some(query) = state.queries.get_mut(&query_id) {
                    query.remaining = data.to;
                }
            }
            StockQueryEvent::SupplierConfirmed(_)
            | StockQueryEvent::SupplierDeclined(_)
            | StockQueryEvent::QueryCancelled(_)
            | StockQueryEvent::QueryExpired(_) => {
                state.queries.remove(&query_id);
            }
            StockQueryEvent::ResponseIgnored(_) => {}
        }

        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.queries.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for OpenQueriesView {
    fn name(&self) -> &'static str {
        "OpenQueriesView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.queries.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use domain::DomainEvent;
    use domain::stock_query::{
        QueryCancelledData, QueryDispatchedData, RequirementReducedData, SupplierDeclinedData,
    };
    use event_store::Version;

    use super::*;

    fn envelope(query_id: AggregateId, version: i64, event: &StockQueryEvent) -> EventEnvelope {
        let mut env = EventEnvelope::builder()
            .aggregate_id(query_id)
            .aggregate_type("StockQuery")
            .event_type(event.event_type())
            .version(Version::new(version))
            .payload(event)
            .unwrap()
            .build()
            .unwrap();
        env.position = version as u64;
        env
    }

    fn dispatched(query_id: AggregateId, order_id: AggregateId, supplier: &str) -> StockQueryEvent {
        let now = Utc::now();
        StockQueryEvent::QueryDispatched(QueryDispatchedData {
            query_id,
            order_id,
            product_id: ProductId::new("RING-22K"),
            supplier_id: SupplierId::new(supplier),
            quantity: 10,
            created_at: now,
            expires_at: now + Duration::hours(24),
        })
    }

    #[tokio::test]
    async fn dispatched_query_is_open_until_terminal() {
        let view = OpenQueriesView::new();
        let query_id = AggregateId::new();
        let order_id = AggregateId::new();

        view.handle(&envelope(query_id, 1, &dispatched(query_id, order_id, "SUP-1")))
            .await
            .unwrap();
        assert_eq!(view.for_order(order_id).await.len(), 1);
        assert_eq!(view.for_supplier(&SupplierId::new("SUP-1")).await.len(), 1);

        let declined = StockQueryEvent::SupplierDeclined(SupplierDeclinedData {
            declined_at: Utc::now(),
        });
        view.handle(&envelope(query_id, 2, &declined)).await.unwrap();

        assert!(view.get(query_id).await.is_none());
        assert_eq!(view.position().await.last_position, 2);
    }

    #[tokio::test]
    async fn reduction_updates_remaining() {
        let view = OpenQueriesView::new();
        let query_id = AggregateId::new();
        view.handle(&envelope(query_id, 1, &dispatched(query_id, AggregateId::new(), "SUP-1")))
            .await
            .unwrap();

        let reduced = StockQueryEvent::RequirementReduced(RequirementReducedData {
            from: 10,
            to: 4,
            reduced_at: Utc::now(),
        });
        view.handle(&envelope(query_id, 2, &reduced)).await.unwrap();

        let open = view.get(query_id).await.unwrap();
        assert_eq!(open.requested, 10);
        assert_eq!(open.remaining, 4);
    }

    #[tokio::test]
    async fn expiring_before_filters_on_deadline() {
        let view = OpenQueriesView::new();
        let query_id = AggregateId::new();
        view.handle(&envelope(query_id, 1, &dispatched(query_id, AggregateId::new(), "SUP-1")))
            .await
            .unwrap();

        assert!(view.expiring_before(Utc::now()).await.is_empty());
        assert_eq!(
            view.expiring_before(Utc::now() + Duration::hours(25))
                .await
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn other_aggregates_only_advance_position() {
        let view = OpenQueriesView::new();
        let mut env = envelope(
            AggregateId::new(),
            1,
            &StockQueryEvent::QueryCancelled(QueryCancelledData {
                reason: "n/a".into(),
                cancelled_at: Utc::now(),
            }),
        );
        env.aggregate_type = "Order".into();
        env.position = 7;

        view.handle(&env).await.unwrap();
        assert_eq!(view.position().await.last_position, 7);
        assert_eq!(ReadModel::count(&view), 0);
    }
}
