//! Product aggregate implementation.

use std::collections::HashSet;

use common::{AggregateId, ProductId};
use event_store::Version;

use crate::aggregate::Aggregate;

use super::{
    ProductError, ProductEvent,
    events::{ProductRegisteredData, StockReceivedData},
};

/// Stock position of one SKU.
///
/// Quantities are unsigned and every decrement is capped at what is on hand,
/// so the quantity can never go negative.
#[derive(Debug, Clone, Default)]
pub struct Product {
    id: Option<AggregateId>,
    version: Version,
    product_id: Option<ProductId>,
    name: String,
    category: String,
    quantity: u32,
    low_stock_threshold: u32,
    /// Supplier queries whose credit has already been applied.
    received_from: HashSet<AggregateId>,
}

impl Aggregate for Product {
    type Event = ProductEvent;
    type Error = ProductError;

    fn aggregate_type() -> &'static str {
        "Product"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            ProductEvent::ProductRegistered(data) => self.apply_registered(data),
            ProductEvent::StockReserved(data) => {
                self.quantity = self.quantity.saturating_sub(data.reserved);
            }
            ProductEvent::StockReceived(data) => self.apply_received(data),
        }
    }
}

// Query methods
impl Product {
    pub fn product_id(&self) -> Option<&ProductId> {
        self.product_id.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn low_stock_threshold(&self) -> u32 {
        self.low_stock_threshold
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.low_stock_threshold
    }

    /// True if the credit for this supplier query was already applied.
    pub fn has_received(&self, query_id: AggregateId) -> bool {
        self.received_from.contains(&query_id)
    }
}

// Command methods
impl Product {
    pub fn register(
        &self,
        product_id: ProductId,
        name: String,
        category: String,
        quantity: u32,
        low_stock_threshold: u32,
    ) -> Result<Vec<ProductEvent>, ProductError> {
        if self.id.is_some() {
            return Err(ProductError::AlreadyRegistered { product_id });
        }
        if product_id.as_str().trim().is_empty() {
            return Err(ProductError::EmptyField { field: "id" });
        }
        if name.trim().is_empty() {
            return Err(ProductError::EmptyField { field: "name" });
        }
        if category.trim().is_empty() {
            return Err(ProductError::EmptyField { field: "category" });
        }

        Ok(vec![ProductEvent::product_registered(
            product_id,
            name,
            category,
            quantity,
            low_stock_threshold,
        )])
    }

    /// Takes up to `requested` units for an order, whatever is on hand.
    ///
    /// Nothing is recorded when the shelf is empty or nothing was asked for.
    pub fn reserve_up_to(
        &self,
        order_id: AggregateId,
        requested: u32,
    ) -> Result<Vec<ProductEvent>, ProductError> {
        self.ensure_registered()?;

        let reserved = requested.min(self.quantity);
        if reserved == 0 {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::stock_reserved(order_id, requested, reserved)])
    }

    /// Credits units confirmed by a supplier. Applying the same query twice
    /// is a no-op.
    pub fn receive(
        &self,
        query_id: AggregateId,
        quantity: u32,
    ) -> Result<Vec<ProductEvent>, ProductError> {
        self.ensure_registered()?;

        if quantity == 0 || self.has_received(query_id) {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::stock_received(query_id, quantity)])
    }

    fn ensure_registered(&self) -> Result<(), ProductError> {
        if self.id.is_none() {
            return Err(ProductError::NotRegistered);
        }
        Ok(())
    }
}

// Apply event helpers
impl Product {
    fn apply_registered(&mut self, data: ProductRegisteredData) {
        self.id = Some(AggregateId::for_product(&data.product_id));
        self.product_id = Some(data.product_id);
        self.name = data.name;
        self.category = data.category;
        self.quantity = data.quantity;
        self.low_stock_threshold = data.low_stock_threshold;
    }

    fn apply_received(&mut self, data: StockReceivedData) {
        if self.received_from.insert(data.query_id) {
            self.quantity = self.quantity.saturating_add(data.quantity);
        }
    }
}
