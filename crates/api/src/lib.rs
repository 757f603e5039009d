//! HTTP surface for the supplier-sourced fulfillment saga.
//!
//! REST endpoints for the catalogue, orders and supplier responses, plus
//! dashboard reads served from projections. Structured logging via tracing
//! and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/products", post(routes::catalog::create_product::<S>))
        .route("/suppliers", post(routes::catalog::create_supplier::<S>))
        .route("/inventory", get(routes::catalog::inventory::<S>))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders/board", get(routes::orders::board::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route(
            "/orders/{id}/products/{product_id}/redispatch",
            post(routes::orders::redispatch::<S>),
        )
        .route("/queries/open", get(routes::queries::open::<S>))
        .route("/queries/{id}", get(routes::queries::get::<S>))
        .route("/queries/{id}/response", post(routes::queries::respond::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
