//! State shared by the saga components.

use common::{AggregateId, ProductId, SupplierId};
use domain::{EscalationKind, FulfillmentGroup, OrderService, StockQuery, StockQueryService};
use event_store::EventStore;

use crate::config::SagaConfig;
use crate::error::Result;
use crate::locks::GroupLocks;
use crate::services::{Collaborators, Escalation};
use crate::status::GroupTally;

pub(crate) struct SagaContext<S: EventStore> {
    pub store: S,
    pub orders: OrderService<S>,
    pub queries: StockQueryService<S>,
    pub collaborators: Collaborators,
    pub config: SagaConfig,
    pub locks: GroupLocks,
}

impl<S: EventStore + Clone> SagaContext<S> {
    pub fn new(store: S, collaborators: Collaborators, config: SagaConfig) -> Self {
        Self {
            orders: OrderService::new(store.clone()),
            queries: StockQueryService::new(store.clone()),
            store,
            collaborators,
            config,
            locks: GroupLocks::default(),
        }
    }
}

impl<S: EventStore> SagaContext<S> {
    /// Loads every query of a group. Ids the order recorded but whose query
    /// was never written are skipped.
    pub async fn group_queries(&self, group: &FulfillmentGroup) -> Result<Vec<StockQuery>> {
        let mut queries = Vec::with_capacity(group.queries.len());
        for dispatched in &group.queries {
            match self.queries.get_query(dispatched.query_id).await? {
                Some(query) => queries.push(query),
                None => tracing::warn!(
                    query_id = %dispatched.query_id,
                    "dispatched query has no stream"
                ),
            }
        }
        Ok(queries)
    }

    pub async fn tally(&self, group: &FulfillmentGroup) -> Result<GroupTally> {
        let queries = self.group_queries(group).await?;
        Ok(GroupTally::from_queries(group, &queries))
    }

    /// Sends a supplier message without letting a failure propagate.
    pub async fn send_to_supplier(&self, supplier_id: &SupplierId, text: &str) {
        if let Err(e) = self.collaborators.messenger.send(supplier_id, text).await {
            metrics::counter!("supplier_messages_failed_total").increment(1);
            tracing::warn!(%supplier_id, error = %e, "supplier message not delivered");
        }
    }

    /// Records an escalation on the order and alerts staff, once per kind
    /// and dispatch round. Returns whether this call raised it.
    pub async fn escalate(
        &self,
        order_id: AggregateId,
        product_id: &ProductId,
        kind: EscalationKind,
        detail: &str,
    ) -> Result<bool> {
        let result = self
            .orders
            .escalate(order_id, product_id, kind, detail)
            .await?;
        if result.events.is_empty() {
            return Ok(false);
        }

        metrics::counter!("escalations_total", "kind" => kind.as_str()).increment(1);
        tracing::warn!(%order_id, %product_id, %kind, detail, "sourcing escalated");

        let escalation = Escalation::new(kind, order_id, product_id.clone(), detail);
        if let Err(e) = self.collaborators.escalations.raise(escalation).await {
            tracing::error!(%order_id, %product_id, error = %e, "escalation sink failed");
        }
        Ok(true)
    }
}
