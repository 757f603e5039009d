use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

#[derive(Default)]
struct Inner {
    /// Global commit log; an event's index + 1 is its position.
    log: Vec<EventEnvelope>,
    /// Indexes into `log` per aggregate, in version order.
    streams: HashMap<AggregateId, Vec<usize>>,
    /// Aggregate ids per aggregate type, in creation order.
    by_type: HashMap<String, Vec<AggregateId>>,
}

impl Inner {
    fn version_of(&self, aggregate_id: AggregateId) -> Version {
        self.streams
            .get(&aggregate_id)
            .and_then(|indexes| indexes.last())
            .map(|&idx| self.log[idx].version)
            .unwrap_or(Version::initial())
    }
}

/// In-memory event store.
///
/// A single write lock serializes appends, which makes the version check
/// and the append one atomic step.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.inner.read().await.log.len()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let aggregate_type = events[0].aggregate_type.clone();
        let first_new_version = events[0].version;

        let mut inner = self.inner.write().await;
        let current_version = inner.version_of(aggregate_id);

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            metrics::counter!("event_store_conflicts_total", "aggregate_type" => aggregate_type)
                .increment(1);
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current_version,
            });
        }

        // Unique (aggregate_id, version) constraint.
        if first_new_version != current_version.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version.unwrap_or(current_version),
                actual: current_version,
            });
        }

        if current_version == Version::initial() {
            inner
                .by_type
                .entry(aggregate_type.clone())
                .or_default()
                .push(aggregate_id);
        }

        let mut last_version = current_version;
        for mut event in events {
            let idx = inner.log.len();
            event.position = idx as u64 + 1;
            last_version = event.version;
            inner.log.push(event);
            inner.streams.entry(aggregate_id).or_default().push(idx);
        }

        tracing::trace!(%aggregate_id, %last_version, "events appended");
        metrics::counter!("event_store_appends_total", "aggregate_type" => aggregate_type)
            .increment(1);

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let inner = self.inner.read().await;
        let events = inner
            .streams
            .get(&aggregate_id)
            .map(|indexes| indexes.iter().map(|&idx| inner.log[idx].clone()).collect())
            .unwrap_or_default();
        Ok(events)
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let inner = self.inner.read().await;
        Ok(inner
            .streams
            .contains_key(&aggregate_id)
            .then(|| inner.version_of(aggregate_id)))
    }

    async fn aggregate_ids(&self, aggregate_type: &str) -> Result<Vec<AggregateId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_type
            .get(aggregate_type)
            .cloned()
            .unwrap_or_default())
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        self.stream_events_after(0).await
    }

    async fn stream_events_after(&self, position: u64) -> Result<EventStream> {
        use futures_util::stream;

        let inner = self.inner.read().await;
        let start = (position as usize).min(inner.log.len());
        let events = inner.log[start..].to_vec();

        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn create_test_event(
        aggregate_id: AggregateId,
        aggregate_type: &str,
        version: Version,
        event_type: &str,
    ) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type(aggregate_type)
            .event_type(event_type)
            .version(version)
            .payload_raw(serde_json::json!({"test": true}))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn append_single_event() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();
        let event = create_test_event(aggregate_id, "Order", Version::first(), "OrderPlaced");

        let version = store
            .append(vec![event], AppendOptions::expect_new())
            .await
            .unwrap();
        assert_eq!(version, Version::first());

        let events = store.get_events_for_aggregate(aggregate_id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].position, 1);
    }

    #[tokio::test]
    async fn append_multiple_events() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let events = vec![
            create_test_event(aggregate_id, "Order", Version::new(1), "OrderPlaced"),
            create_test_event(aggregate_id, "Order", Version::new(2), "ShortfallRecorded"),
            create_test_event(aggregate_id, "Order", Version::new(3), "QueriesDispatched"),
        ];

        let version = store
            .append(events, AppendOptions::expect_new())
            .await
            .unwrap();
        assert_eq!(version, Version::new(3));
        assert_eq!(
            store.get_aggregate_version(aggregate_id).await.unwrap(),
            Some(Version::new(3))
        );
    }

    #[tokio::test]
    async fn concurrency_conflict_on_wrong_version() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let event1 = create_test_event(aggregate_id, "StockQuery", Version::first(), "QueryDispatched");
        store
            .append(vec![event1], AppendOptions::expect_new())
            .await
            .unwrap();

        let event2 = create_test_event(aggregate_id, "StockQuery", Version::new(2), "QueryExpired");
        let result = store
            .append(vec![event2], AppendOptions::expect_version(Version::initial()))
            .await;

        match result {
            Err(EventStoreError::ConcurrencyConflict {
                expected, actual, ..
            }) => {
                assert_eq!(expected, Version::initial());
                assert_eq!(actual, Version::first());
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_version_without_expectation_is_rejected() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let event = create_test_event(aggregate_id, "Product", Version::first(), "ProductRegistered");
        store.append(vec![event], AppendOptions::new()).await.unwrap();

        let again = create_test_event(aggregate_id, "Product", Version::first(), "ProductRegistered");
        let result = store.append(vec![again], AppendOptions::new()).await;
        assert!(result.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn concurrent_appends_at_same_version_have_one_winner() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();
        store
            .append(
                vec![create_test_event(aggregate_id, "StockQuery", Version::first(), "QueryDispatched")],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let event =
                    create_test_event(aggregate_id, "StockQuery", Version::new(2), "SupplierConfirmed");
                store
                    .append(vec![event], AppendOptions::expect_version(Version::first()))
                    .await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.event_count().await, 2);
    }

    #[tokio::test]
    async fn aggregate_ids_are_grouped_by_type() {
        let store = InMemoryEventStore::new();
        let q1 = AggregateId::new();
        let q2 = AggregateId::new();
        let order = AggregateId::new();

        for (id, kind) in [(q1, "StockQuery"), (order, "Order"), (q2, "StockQuery")] {
            store
                .append(
                    vec![create_test_event(id, kind, Version::first(), "Created")],
                    AppendOptions::expect_new(),
                )
                .await
                .unwrap();
        }
        store
            .append(
                vec![create_test_event(q1, "StockQuery", Version::new(2), "QueryExpired")],
                AppendOptions::expect_version(Version::first()),
            )
            .await
            .unwrap();

        assert_eq!(store.aggregate_ids("StockQuery").await.unwrap(), vec![q1, q2]);
        assert_eq!(store.aggregate_ids("Order").await.unwrap(), vec![order]);
        assert!(store.aggregate_ids("Product").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stream_after_position_skips_consumed_events() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        store
            .append(
                vec![create_test_event(a, "Order", Version::first(), "OrderPlaced")],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();
        store
            .append(
                vec![create_test_event(b, "Order", Version::first(), "OrderPlaced")],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        let all: Vec<_> = store.stream_all_events().await.unwrap().collect().await;
        assert_eq!(all.len(), 2);

        let rest: Vec<_> = store.stream_events_after(1).await.unwrap().collect().await;
        assert_eq!(rest.len(), 1);
        let event = rest.into_iter().next().unwrap().unwrap();
        assert_eq!(event.aggregate_id, b);
        assert_eq!(event.position, 2);

        let none: Vec<_> = store.stream_events_after(10).await.unwrap().collect().await;
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn unknown_aggregate_has_no_version() {
        let store = InMemoryEventStore::new();
        assert_eq!(
            store.get_aggregate_version(AggregateId::new()).await.unwrap(),
            None
        );
    }
}
