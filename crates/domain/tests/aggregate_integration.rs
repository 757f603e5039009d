//! Integration tests for the fulfillment aggregates.
//!
//! These exercise the aggregates against a shared event store: persistence,
//! reconstruction from events, and optimistic concurrency.

use chrono::{Duration, Utc};
use common::{AggregateId, ProductId, SupplierId};
use domain::{
    Aggregate, CancelOrder, CustomerId, DispatchQuery, DispatchedQuery, DomainError, DomainEvent,
    Money, NotificationState, OrderError, OrderEvent, OrderItem, OrderService, OrderStatus,
    PlaceOrder, ProductService, QueryStatus, RegisterProduct, StockQueryError, StockQueryService,
    order_number,
};
use event_store::{EventStore, InMemoryEventStore, Version};

struct Services {
    store: InMemoryEventStore,
    orders: OrderService<InMemoryEventStore>,
    queries: StockQueryService<InMemoryEventStore>,
    products: ProductService<InMemoryEventStore>,
}

fn services() -> Services {
    let store = InMemoryEventStore::new();
    Services {
        orders: OrderService::new(store.clone()),
        queries: StockQueryService::new(store.clone()),
        products: ProductService::new(store.clone()),
        store,
    }
}

async fn dispatch(
    services: &Services,
    order_id: AggregateId,
    sku: &ProductId,
    supplier: &str,
    quantity: u32,
) -> AggregateId {
    let query_id = AggregateId::new();
    services
        .orders
        .record_dispatch(
            order_id,
            sku,
            vec![DispatchedQuery {
                query_id,
                supplier_id: SupplierId::new(supplier),
            }],
        )
        .await
        .unwrap();
    services
        .queries
        .dispatch(DispatchQuery {
            query_id,
            order_id,
            product_id: sku.clone(),
            supplier_id: SupplierId::new(supplier),
            quantity,
            expires_at: Utc::now() + Duration::hours(24),
        })
        .await
        .unwrap();
    query_id
}

mod sourcing_lifecycle {
    use super::*;

    #[tokio::test]
    async fn shortfall_sourced_from_supplier() {
        let services = services();
        let sku = ProductId::new("RING-22K");

        services
            .products
            .register_product(RegisterProduct::new(sku.clone(), "Gold ring", "jewellery", 4))
            .await
            .unwrap();

        let order_id = AggregateId::new();
        let reservation = services
            .products
            .reserve_up_to(&sku, order_id, 10)
            .await
            .unwrap();
        assert_eq!(reservation.reserved, 4);

        let result = services
            .orders
            .place_order(PlaceOrder::new(
                order_id,
                CustomerId::new(),
                vec![
                    OrderItem::new(sku.clone(), "Gold ring", 10, Money::from_cents(25_000))
                        .with_reserved(reservation.reserved),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(result.aggregate.status(), OrderStatus::AwaitingStock);
        assert_eq!(result.new_version, Version::new(2));

        let query_id = dispatch(&services, order_id, &sku, "SUP-A", 6).await;

        services
            .queries
            .confirm(query_id, 6, 6, Some(Money::from_cents(20_000)), Some(3))
            .await
            .unwrap();
        assert!(
            services
                .products
                .receive_stock(&sku, query_id, 6)
                .await
                .unwrap()
        );

        let result = services
            .orders
            .fulfill(order_id, 3, Utc::now())
            .await
            .unwrap();
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.aggregate.status(), OrderStatus::Fulfilled);

        services.orders.record_notified(order_id, 1).await.unwrap();

        let order = services.orders.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.notification(), NotificationState::Delivered);

        let product = services.products.get_product(&sku).await.unwrap().unwrap();
        assert_eq!(product.quantity(), 6);
    }

    #[tokio::test]
    async fn order_number_is_available_before_loading_the_order() {
        let services = services();
        let order_id = AggregateId::new();
        let reference = order_number(order_id);

        services
            .orders
            .place_order(PlaceOrder::new(
                order_id,
                CustomerId::new(),
                vec![OrderItem::new("RING-22K", "Gold ring", 1, Money::from_cents(25_000))],
            ))
            .await
            .unwrap();

        let order = services.orders.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.order_number(), reference);
        assert!(reference.starts_with("ORD-"));
    }

    #[tokio::test]
    async fn cancelled_order_rejects_fulfillment() {
        let services = services();
        let order_id = AggregateId::new();
        services
            .orders
            .place_order(PlaceOrder::new(
                order_id,
                CustomerId::new(),
                vec![OrderItem::new("SKU-1", "Widget", 2, Money::from_cents(100))],
            ))
            .await
            .unwrap();

        services
            .orders
            .cancel_order(CancelOrder::new(order_id, "customer request"))
            .await
            .unwrap();

        let result = services.orders.fulfill(order_id, 5, Utc::now()).await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::InvalidStateTransition {
                current_status: OrderStatus::Cancelled,
                ..
            }))
        ));
    }
}

mod persistence {
    use super::*;

    #[tokio::test]
    async fn events_are_stored_with_types_and_versions() {
        let services = services();
        let order_id = AggregateId::new();
        let sku = ProductId::new("SKU-1");

        services
            .orders
            .place_order(PlaceOrder::new(
                order_id,
                CustomerId::new(),
                vec![OrderItem::new(sku.clone(), "Widget", 5, Money::from_cents(100))],
            ))
            .await
            .unwrap();
        dispatch(&services, order_id, &sku, "SUP-A", 5).await;

        let events = services
            .store
            .get_events_for_aggregate(order_id)
            .await
            .unwrap();
        let types: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(
            types,
            vec!["OrderPlaced", "ShortfallRecorded", "QueriesDispatched"]
        );
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.version, Version::new(i as i64 + 1));
            assert_eq!(event.aggregate_type, "Order");
        }

        let query_ids = services.store.aggregate_ids("StockQuery").await.unwrap();
        assert_eq!(query_ids.len(), 1);
    }

    #[tokio::test]
    async fn aggregate_reconstruction_from_events() {
        let services = services();
        let order_id = AggregateId::new();
        let sku = ProductId::new("SKU-1");

        services
            .orders
            .place_order(PlaceOrder::new(
                order_id,
                CustomerId::new(),
                vec![OrderItem::new(sku.clone(), "Widget", 5, Money::from_cents(100))],
            ))
            .await
            .unwrap();
        let query_id = dispatch(&services, order_id, &sku, "SUP-A", 5).await;
        services.queries.reduce_requirement(query_id, 2).await.unwrap();

        let envelopes = services
            .store
            .get_events_for_aggregate(order_id)
            .await
            .unwrap();
        let mut replayed = domain::Order::default();
        for envelope in envelopes {
            let event: OrderEvent = envelope.decode().unwrap();
            assert_eq!(event.event_type(), envelope.event_type);
            replayed.apply(event);
        }

        let loaded = services.orders.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(replayed.status(), loaded.status());
        assert_eq!(replayed.group(&sku), loaded.group(&sku));

        let query = services.queries.get_query(query_id).await.unwrap().unwrap();
        assert_eq!(query.requested(), 5);
        assert_eq!(query.remaining(), 2);
        assert_eq!(query.version(), Version::new(2));
    }
}

mod concurrency {
    use super::*;
    use event_store::{AppendOptions, EventEnvelope, EventStoreError};

    #[tokio::test]
    async fn stale_append_is_rejected() {
        let services = services();
        let order_id = AggregateId::new();
        let sku = ProductId::new("SKU-1");
        services
            .orders
            .place_order(PlaceOrder::new(
                order_id,
                CustomerId::new(),
                vec![OrderItem::new(sku.clone(), "Widget", 5, Money::from_cents(100))],
            ))
            .await
            .unwrap();
        let query_id = dispatch(&services, order_id, &sku, "SUP-A", 5).await;

        let stale = services.queries.get_query(query_id).await.unwrap().unwrap();

        services.queries.decline(query_id).await.unwrap();

        // A cancel decided against the stale copy, appended with its version.
        let event = stale.cancel("fulfilled elsewhere").unwrap().remove(0);
        let envelope = EventEnvelope::builder()
            .aggregate_id(query_id)
            .aggregate_type("StockQuery")
            .event_type(event.event_type())
            .version(stale.version().next())
            .payload(&event)
            .unwrap()
            .build()
            .unwrap();
        let result = services
            .store
            .append(vec![envelope], AppendOptions::expect_version(stale.version()))
            .await;
        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));

        // The retrying path re-decides against the fresh state instead.
        let result = services.queries.cancel(query_id, "fulfilled elsewhere").await;
        assert!(matches!(
            result,
            Err(DomainError::StockQuery(StockQueryError::AlreadyTerminal {
                status: QueryStatus::Unavailable
            }))
        ));
    }
}
