//! Products, suppliers and the stock board.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use domain::RegisterProduct;
use event_store::EventStore;
use projections::StockLevel;
use saga::{ProductSnapshot, Supplier};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub product_id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub quantity: u32,
    pub low_stock_threshold: Option<u32>,
}

#[derive(Deserialize)]
pub struct CreateSupplierRequest {
    pub supplier_id: String,
    pub name: String,
    pub categories: Vec<String>,
}

#[derive(Serialize)]
pub struct InventoryResponse {
    pub products: Vec<StockLevel>,
    pub low_stock: Vec<String>,
}

/// POST /products
#[tracing::instrument(skip(state, req), fields(product_id = %req.product_id))]
pub async fn create_product<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductSnapshot>), ApiError> {
    let mut cmd = RegisterProduct::new(req.product_id, req.name, req.category, req.quantity);
    if let Some(threshold) = req.low_stock_threshold {
        cmd = cmd.with_low_stock_threshold(threshold);
    }

    let snapshot = state.coordinator.register_product(cmd).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// POST /suppliers. Registering an existing id replaces it.
#[tracing::instrument(skip(state, req), fields(supplier_id = %req.supplier_id))]
pub async fn create_supplier<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateSupplierRequest>,
) -> Result<(StatusCode, Json<Supplier>), ApiError> {
    if req.supplier_id.trim().is_empty() || req.categories.is_empty() {
        return Err(ApiError::BadRequest(
            "supplier_id and at least one category are required".to_string(),
        ));
    }

    let supplier = Supplier::new(req.supplier_id, req.name, req.categories);
    state.collaborators.suppliers.register(supplier.clone());
    tracing::info!("supplier registered");
    Ok((StatusCode::CREATED, Json(supplier)))
}

/// GET /inventory
#[tracing::instrument(skip(state))]
pub async fn inventory<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<InventoryResponse>, ApiError> {
    state.catch_up().await?;

    let products = state.stock_levels.all().await;
    let low_stock = products
        .iter()
        .filter(|p| p.is_low_stock())
        .map(|p| p.product_id.to_string())
        .collect();

    Ok(Json(InventoryResponse {
        products,
        low_stock,
    }))
}
