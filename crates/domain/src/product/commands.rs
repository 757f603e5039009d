//! Product commands.

use common::{AggregateId, ProductId};

use crate::command::Command;

use super::{DEFAULT_LOW_STOCK_THRESHOLD, Product};

/// Command to register a product with its opening stock.
#[derive(Debug, Clone)]
pub struct RegisterProduct {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub quantity: u32,
    pub low_stock_threshold: u32,
}

impl RegisterProduct {
    pub fn new(
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        category: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            category: category.into(),
            quantity,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }

    pub fn with_low_stock_threshold(mut self, threshold: u32) -> Self {
        self.low_stock_threshold = threshold;
        self
    }
}

impl Command for RegisterProduct {
    type Aggregate = Product;

    fn aggregate_id(&self) -> AggregateId {
        AggregateId::for_product(&self.product_id)
    }
}
