use common::{AggregateId, ProductId, SupplierId};
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use domain::{CustomerId, Money, OrderService, RegisterProduct};
use event_store::InMemoryEventStore;
use saga::{
    FulfillmentCoordinator, InMemoryCollaborators, OrderLine, PlaceOrderRequest,
    ResponseSubmission, SagaConfig, Supplier,
};

const SUPPLIERS: [&str; 4] = ["SUP-A", "SUP-B", "SUP-C", "SUP-D"];

struct Fixture {
    coordinator: FulfillmentCoordinator<InMemoryEventStore>,
    queries: Vec<AggregateId>,
}

async fn fixture() -> Fixture {
    let store = InMemoryEventStore::new();
    let collab = InMemoryCollaborators::new(store.clone());
    for code in SUPPLIERS {
        collab
            .suppliers
            .register(Supplier::new(code, code, ["jewellery"]));
    }
    let coordinator =
        FulfillmentCoordinator::new(store.clone(), collab.collaborators(), SagaConfig::default());
    coordinator
        .register_product(RegisterProduct::new("RING", "Gold Ring", "jewellery", 0))
        .await
        .unwrap();

    let order_id = coordinator
        .place_order(PlaceOrderRequest::new(
            CustomerId::new(),
            vec![OrderLine::new("RING", 20, Money::from_cents(5_000))],
        ))
        .await
        .unwrap()
        .order_id;

    let order = OrderService::new(store)
        .get_order(order_id)
        .await
        .unwrap()
        .unwrap();
    let group = order.group(&ProductId::new("RING")).unwrap();
    let queries = SUPPLIERS
        .iter()
        .filter_map(|code| {
            group
                .queries
                .iter()
                .find(|q| q.supplier_id == SupplierId::new(*code))
                .map(|q| q.query_id)
        })
        .collect();

    Fixture {
        coordinator,
        queries,
    }
}

fn bench_partial_offers(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("saga/four_partial_offers_to_fulfilled", |b| {
        b.iter_batched(
            || rt.block_on(fixture()),
            |fixture| {
                rt.block_on(async {
                    for query_id in &fixture.queries {
                        fixture
                            .coordinator
                            .submit_supplier_response(ResponseSubmission::available(*query_id, 5))
                            .await
                            .unwrap();
                    }
                });
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_duplicate_response(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let fixture = rt.block_on(fixture());
    let query_id = fixture.queries[0];
    rt.block_on(async {
        fixture
            .coordinator
            .submit_supplier_response(ResponseSubmission::available(query_id, 5))
            .await
            .unwrap()
    });

    c.bench_function("saga/duplicate_response", |b| {
        b.iter(|| {
            rt.block_on(async {
                fixture
                    .coordinator
                    .submit_supplier_response(ResponseSubmission::available(query_id, 5))
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_partial_offers, bench_duplicate_response);
criterion_main!(benches);
