//! Saga commands → ProjectionProcessor → dashboard views.

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use common::{AggregateId, ProductId, SupplierId};
use domain::{CustomerId, EscalationKind, Money, NotificationState, OrderStatus, RegisterProduct};
use event_store::InMemoryEventStore;
use projections::{OpenQueriesView, OrderBoardView, ProjectionProcessor, StockLevelsView};
use saga::{
    FulfillmentCoordinator, InMemoryCollaborators, OrderLine, PlaceOrderRequest,
    ResponseSubmission, SagaConfig, Supplier,
};

struct Dashboard {
    coordinator: FulfillmentCoordinator<InMemoryEventStore>,
    collab: InMemoryCollaborators,
    processor: ProjectionProcessor<InMemoryEventStore>,
    open: OpenQueriesView,
    stock: StockLevelsView,
    board: OrderBoardView,
}

fn setup() -> Dashboard {
    let store = InMemoryEventStore::new();
    let collab = InMemoryCollaborators::new(store.clone());
    let config = SagaConfig::default().with_notify_backoff(StdDuration::from_millis(1));
    let coordinator = FulfillmentCoordinator::new(store.clone(), collab.collaborators(), config);

    let open = OpenQueriesView::new();
    let stock = StockLevelsView::new();
    let board = OrderBoardView::new();

    let mut processor = ProjectionProcessor::new(store);
    processor.register(Box::new(open.clone()));
    processor.register(Box::new(stock.clone()));
    processor.register(Box::new(board.clone()));

    Dashboard {
        coordinator,
        collab,
        processor,
        open,
        stock,
        board,
    }
}

impl Dashboard {
    async fn ring_order(&self, stocked: u32, ordered: u32) -> AggregateId {
        self.coordinator
            .register_product(RegisterProduct::new("RING", "Gold ring", "jewellery", stocked))
            .await
            .unwrap();
        for code in ["SUP-A", "SUP-B"] {
            self.collab
                .suppliers
                .register(Supplier::new(code, format!("{code} Ltd"), ["jewellery"]));
        }
        let lines = vec![OrderLine::new("RING", ordered, Money::from_cents(2_500))];
        self.coordinator
            .place_order(PlaceOrderRequest::new(CustomerId::new(), lines))
            .await
            .unwrap()
            .order_id
    }
}

#[tokio::test]
async fn shortfall_shows_on_every_view() {
    let d = setup();
    let order_id = d.ring_order(4, 10).await;

    d.processor.run_catch_up().await.unwrap();

    let card = d.board.get(order_id).await.unwrap();
    assert_eq!(card.status, OrderStatus::AwaitingStock);
    assert_eq!(card.queries_dispatched, 2);
    assert!(card.short_products.contains(&ProductId::new("RING")));

    let open = d.open.for_order(order_id).await;
    assert_eq!(open.len(), 2);
    assert!(open.iter().all(|q| q.remaining == 6));

    let ring = d.stock.get(&ProductId::new("RING")).await.unwrap();
    assert_eq!(ring.quantity, 0);
    assert_eq!(ring.reserved_total, 4);
    assert_eq!(d.stock.low_stock().await.len(), 1);
}

#[tokio::test]
async fn partial_offer_reduces_sibling_and_full_cover_clears_board() {
    let d = setup();
    let order_id = d.ring_order(0, 10).await;
    d.processor.run_catch_up().await.unwrap();

    let sup_a = d.open.for_supplier(&SupplierId::new("SUP-A")).await.remove(0);
    d.coordinator
        .submit_supplier_response(ResponseSubmission::available(sup_a.query_id, 4))
        .await
        .unwrap();
    d.processor.run_catch_up().await.unwrap();

    let remaining = d.open.for_order(order_id).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].supplier_id, SupplierId::new("SUP-B"));
    assert_eq!(remaining[0].remaining, 6);

    d.coordinator
        .submit_supplier_response(ResponseSubmission::available(remaining[0].query_id, 6))
        .await
        .unwrap();
    d.processor.run_catch_up().await.unwrap();

    assert!(d.open.all().await.is_empty());
    let card = d.board.get(order_id).await.unwrap();
    assert_eq!(card.status, OrderStatus::Fulfilled);
    assert_eq!(card.notification, NotificationState::Delivered);

    let ring = d.stock.get(&ProductId::new("RING")).await.unwrap();
    assert_eq!(ring.received_total, 10);
    assert_eq!(ring.quantity, 10);
}

#[tokio::test]
async fn expired_queries_surface_as_escalations() {
    let d = setup();
    let order_id = d.ring_order(0, 3).await;

    d.coordinator
        .sweep_expired(Utc::now() + Duration::hours(25))
        .await
        .unwrap();
    d.processor.run_catch_up().await.unwrap();

    assert!(d.open.all().await.is_empty());
    let escalated = d.board.escalated().await;
    assert_eq!(escalated.len(), 1);
    assert_eq!(escalated[0].order_id, order_id);
    assert_eq!(escalated[0].escalations[0].kind, EscalationKind::QueriesExpired);
    assert_eq!(d.board.summary().await.escalated, 1);
}

#[tokio::test]
async fn rebuild_matches_incremental_state() {
    let d = setup();
    let order_id = d.ring_order(2, 5).await;
    d.coordinator
        .cancel_order(order_id, "customer changed their mind")
        .await
        .unwrap();
    d.processor.run_catch_up().await.unwrap();
    let before = d.board.summary().await;

    d.processor.rebuild_all().await.unwrap();

    assert_eq!(d.board.summary().await, before);
    assert_eq!(before.cancelled, 1);
    assert!(d.open.all().await.is_empty());
}
