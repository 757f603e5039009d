//! Inventory ledger trait and its event-sourced implementation.

use async_trait::async_trait;
use common::{AggregateId, ProductId};
use domain::{DomainError, Product, ProductError, ProductService, RegisterProduct};
use event_store::EventStore;
use serde::Serialize;

use crate::error::SagaError;

/// Point-in-time view of one product's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub quantity: u32,
    pub low_stock_threshold: u32,
}

impl ProductSnapshot {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.low_stock_threshold
    }

    fn from_product(product: &Product) -> Option<Self> {
        Some(Self {
            product_id: product.product_id()?.clone(),
            name: product.name().to_string(),
            category: product.category().to_string(),
            quantity: product.quantity(),
            low_stock_threshold: product.low_stock_threshold(),
        })
    }
}

/// Stock ledger the saga reserves from and credits into.
///
/// Every method is atomic per product. Quantities never go negative.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Adds a product to the catalogue with its opening stock.
    async fn register(&self, cmd: RegisterProduct) -> Result<ProductSnapshot, SagaError>;

    /// Current stock of a product, `None` if unknown.
    async fn snapshot(&self, product_id: &ProductId) -> Result<Option<ProductSnapshot>, SagaError>;

    /// Takes up to `requested` units for an order. Returns the units taken.
    async fn reserve_up_to(
        &self,
        product_id: &ProductId,
        order_id: AggregateId,
        requested: u32,
    ) -> Result<u32, SagaError>;

    /// Adds a supplier's credited units. Applying the same query twice is a
    /// no-op; returns whether this call changed the stock.
    async fn credit(
        &self,
        product_id: &ProductId,
        query_id: AggregateId,
        quantity: u32,
    ) -> Result<bool, SagaError>;
}

/// Inventory ledger backed by the `Product` aggregate.
pub struct EventSourcedInventory<S: EventStore> {
    products: ProductService<S>,
}

impl<S: EventStore> EventSourcedInventory<S> {
    pub fn new(store: S) -> Self {
        Self {
            products: ProductService::new(store),
        }
    }
}

fn not_found(product_id: &ProductId, err: DomainError) -> SagaError {
    match err {
        DomainError::Product(ProductError::NotRegistered) => {
            SagaError::ProductNotFound(product_id.clone())
        }
        other => other.into(),
    }
}

#[async_trait]
impl<S: EventStore> InventoryLedger for EventSourcedInventory<S> {
    async fn register(&self, cmd: RegisterProduct) -> Result<ProductSnapshot, SagaError> {
        let product_id = cmd.product_id.clone();
        let result = self.products.register_product(cmd).await?;
        ProductSnapshot::from_product(&result.aggregate)
            .ok_or(SagaError::ProductNotFound(product_id))
    }

    async fn snapshot(&self, product_id: &ProductId) -> Result<Option<ProductSnapshot>, SagaError> {
        Ok(self
            .products
            .get_product(product_id)
            .await?
            .as_ref()
            .and_then(ProductSnapshot::from_product))
    }

    async fn reserve_up_to(
        &self,
        product_id: &ProductId,
        order_id: AggregateId,
        requested: u32,
    ) -> Result<u32, SagaError> {
        let result = self
            .products
            .reserve_up_to(product_id, order_id, requested)
            .await
            .map_err(|e| not_found(product_id, e))?;
        Ok(result.reserved)
    }

    async fn credit(
        &self,
        product_id: &ProductId,
        query_id: AggregateId,
        quantity: u32,
    ) -> Result<bool, SagaError> {
        self.products
            .receive_stock(product_id, query_id, quantity)
            .await
            .map_err(|e| not_found(product_id, e))
    }
}
