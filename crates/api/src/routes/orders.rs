//! Order placement, status, cancellation and the operations board.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::ProductId;
use domain::{CustomerId, Money};
use event_store::EventStore;
use projections::{BoardSummary, OrderCard};
use saga::{DispatchOutcome, OrderLine, OrderStatusView, PlaceOrderRequest};
use serde::{Deserialize, Serialize};

use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Option<String>,
    pub items: Vec<OrderLineRequest>,
}

#[derive(Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default = "default_cancel_reason")]
    pub reason: String,
}

fn default_cancel_reason() -> String {
    "cancelled by operator".to_string()
}

// -- Response types --

#[derive(Serialize)]
pub struct BoardResponse {
    pub summary: BoardSummary,
    pub awaiting_stock: Vec<OrderCard>,
    pub escalated: Vec<OrderCard>,
    pub failed_notifications: Vec<OrderCard>,
}

// -- Handlers --

/// POST /orders
#[tracing::instrument(skip(state, req))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderStatusView>), ApiError> {
    let customer_id = match req.customer_id.as_deref() {
        Some(id) => {
            let uuid = uuid::Uuid::parse_str(id)
                .map_err(|e| ApiError::BadRequest(format!("Invalid customer_id: {e}")))?;
            CustomerId::from_uuid(uuid)
        }
        None => CustomerId::new(),
    };

    let lines = req
        .items
        .into_iter()
        .map(|line| {
            OrderLine::new(
                line.product_id,
                line.quantity,
                Money::from_cents(line.unit_price_cents),
            )
        })
        .collect();

    let view = state
        .coordinator
        .place_order(PlaceOrderRequest::new(customer_id, lines))
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderStatusView>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    Ok(Json(state.coordinator.get_order_status(order_id).await?))
}

/// POST /orders/{id}/cancel
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<CancelOrderRequest>,
) -> Result<Json<OrderStatusView>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    Ok(Json(
        state.coordinator.cancel_order(order_id, &req.reason).await?,
    ))
}

/// POST /orders/{id}/products/{product_id}/redispatch
#[tracing::instrument(skip(state))]
pub async fn redispatch<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, product_id)): Path<(String, String)>,
) -> Result<Json<DispatchOutcome>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let outcome = state
        .coordinator
        .redispatch(order_id, &ProductId::new(product_id))
        .await?;
    Ok(Json(outcome))
}

/// GET /orders/board
#[tracing::instrument(skip(state))]
pub async fn board<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<BoardResponse>, ApiError> {
    state.catch_up().await?;

    Ok(Json(BoardResponse {
        summary: state.board.summary().await,
        awaiting_stock: state.board.awaiting_stock().await,
        escalated: state.board.escalated().await,
        failed_notifications: state.board.failed_notifications().await,
    }))
}
