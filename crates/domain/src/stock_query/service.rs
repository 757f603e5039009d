//! Stock query service.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::order::Money;

use super::{DispatchQuery, StockQuery};

/// Service for managing supplier queries.
///
/// Each transition is decided against the latest version of the query and
/// appended with that version as the expectation. When two transitions race
/// (a response and the expiry sweep, say) the loser reloads, sees the
/// terminal status and is rejected with `AlreadyTerminal`.
pub struct StockQueryService<S: EventStore> {
    handler: CommandHandler<S, StockQuery>,
}

impl<S: EventStore> StockQueryService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, StockQuery> {
        &self.handler
    }

    #[tracing::instrument(skip(self), fields(query_id = %cmd.query_id, supplier_id = %cmd.supplier_id))]
    pub async fn dispatch(
        &self,
        cmd: DispatchQuery,
    ) -> Result<CommandResult<StockQuery>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), |query| {
                query.dispatch(
                    cmd.query_id,
                    cmd.order_id,
                    cmd.product_id.clone(),
                    cmd.supplier_id.clone(),
                    cmd.quantity,
                    cmd.expires_at,
                )
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_query(&self, query_id: AggregateId) -> Result<Option<StockQuery>, DomainError> {
        self.handler.load_existing(query_id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn reduce_requirement(
        &self,
        query_id: AggregateId,
        to: u32,
    ) -> Result<CommandResult<StockQuery>, DomainError> {
        self.handler
            .execute_with_retry(query_id, |query| query.reduce_requirement(to))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn confirm(
        &self,
        query_id: AggregateId,
        offered: u32,
        credited: u32,
        price: Option<Money>,
        lead_time_days: Option<u32>,
    ) -> Result<CommandResult<StockQuery>, DomainError> {
        self.handler
            .execute_with_retry(query_id, |query| {
                query.confirm(offered, credited, price, lead_time_days)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn decline(
        &self,
        query_id: AggregateId,
    ) -> Result<CommandResult<StockQuery>, DomainError> {
        self.handler
            .execute_with_retry(query_id, |query| query.decline())
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel(
        &self,
        query_id: AggregateId,
        reason: &str,
    ) -> Result<CommandResult<StockQuery>, DomainError> {
        self.handler
            .execute_with_retry(query_id, |query| query.cancel(reason))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn expire(
        &self,
        query_id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<StockQuery>, DomainError> {
        self.handler
            .execute_with_retry(query_id, |query| query.expire(now))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn record_ignored(
        &self,
        query_id: AggregateId,
        available: bool,
        quantity: u32,
    ) -> Result<CommandResult<StockQuery>, DomainError> {
        self.handler
            .execute_with_retry(query_id, |query| query.record_ignored(available, quantity))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use common::{ProductId, SupplierId};
    use event_store::InMemoryEventStore;

    use super::*;
    use crate::stock_query::{QueryStatus, StockQueryError};

    async fn dispatched(service: &StockQueryService<InMemoryEventStore>) -> AggregateId {
        let query_id = AggregateId::new();
        service
            .dispatch(DispatchQuery {
                query_id,
                order_id: AggregateId::new(),
                product_id: ProductId::new("SKU-1"),
                supplier_id: SupplierId::new("SUP-1"),
                quantity: 10,
                expires_at: Utc::now() + Duration::hours(24),
            })
            .await
            .unwrap();
        query_id
    }

    #[tokio::test]
    async fn dispatch_then_load() {
        let service = StockQueryService::new(InMemoryEventStore::new());
        let query_id = dispatched(&service).await;

        let query = service.get_query(query_id).await.unwrap().unwrap();
        assert_eq!(query.status(), QueryStatus::Pending);
        assert_eq!(query.remaining(), 10);
    }

    #[tokio::test]
    async fn second_transition_sees_terminal_status() {
        let service = StockQueryService::new(InMemoryEventStore::new());
        let query_id = dispatched(&service).await;

        service.confirm(query_id, 10, 10, None, None).await.unwrap();
        let result = service.cancel(query_id, "fulfilled").await;

        assert!(matches!(
            result,
            Err(DomainError::StockQuery(StockQueryError::AlreadyTerminal {
                status: QueryStatus::Available
            }))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_confirm_and_expire_have_one_winner() {
        let store = InMemoryEventStore::new();
        let service = Arc::new(StockQueryService::new(store));
        let query_id = dispatched(&service).await;
        let later = Utc::now() + Duration::hours(25);

        let confirm = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.confirm(query_id, 10, 10, None, None).await })
        };
        let expire = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.expire(query_id, later).await })
        };

        let confirmed = confirm.await.unwrap().is_ok();
        let expired = expire.await.unwrap().is_ok();
        assert!(confirmed ^ expired);

        let query = service.get_query(query_id).await.unwrap().unwrap();
        if confirmed {
            assert_eq!(query.status(), QueryStatus::Available);
        } else {
            assert_eq!(query.status(), QueryStatus::Expired);
        }
    }
}
