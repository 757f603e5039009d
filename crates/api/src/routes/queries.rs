//! Supplier query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::SupplierId;
use domain::Money;
use event_store::EventStore;
use projections::OpenQuery;
use saga::{QueryView, ResponseOutcome, ResponseSubmission};
use serde::Deserialize;

use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::state::AppState;

/// A supplier's answer, already extracted into fields.
#[derive(Deserialize)]
pub struct SupplierResponseRequest {
    pub available: bool,
    #[serde(default)]
    pub quantity: u32,
    pub price_cents: Option<i64>,
    pub lead_time_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct OpenQueriesFilter {
    pub supplier_id: Option<String>,
}

/// POST /queries/{id}/response. Safe to repeat.
#[tracing::instrument(skip(state, req), fields(available = req.available, quantity = req.quantity))]
pub async fn respond<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<SupplierResponseRequest>,
) -> Result<Json<ResponseOutcome>, ApiError> {
    let query_id = parse_aggregate_id(&id)?;

    let mut submission = if req.available {
        ResponseSubmission::available(query_id, req.quantity)
    } else {
        ResponseSubmission::unavailable(query_id)
    };
    if let Some(cents) = req.price_cents {
        submission = submission.with_price(Money::from_cents(cents));
    }
    if let Some(days) = req.lead_time_days {
        submission = submission.with_lead_time(days);
    }

    let outcome = state
        .coordinator
        .submit_supplier_response(submission)
        .await?;
    Ok(Json(outcome))
}

/// GET /queries/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<QueryView>, ApiError> {
    let query_id = parse_aggregate_id(&id)?;
    Ok(Json(state.coordinator.get_query(query_id).await?))
}

/// GET /queries/open, optionally `?supplier_id=`.
#[tracing::instrument(skip(state))]
pub async fn open<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(filter): Query<OpenQueriesFilter>,
) -> Result<Json<Vec<OpenQuery>>, ApiError> {
    state.catch_up().await?;

    let queries = match filter.supplier_id {
        Some(supplier_id) => {
            state
                .open_queries
                .for_supplier(&SupplierId::new(supplier_id))
                .await
        }
        None => state.open_queries.all().await,
    };
    Ok(Json(queries))
}
