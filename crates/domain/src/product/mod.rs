//! Product aggregate: the inventory ledger entry for one SKU.

mod aggregate;
mod commands;
mod events;
mod service;

pub use aggregate::Product;
pub use commands::RegisterProduct;
pub use events::{ProductEvent, ProductRegisteredData, StockReceivedData, StockReservedData};
pub use service::{ProductService, ReservationResult};

use common::ProductId;
use thiserror::Error;

/// Default quantity at or below which a product counts as low on stock.
pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 5;

/// Errors that can occur during product operations.
#[derive(Debug, Error)]
pub enum ProductError {
    #[error("Product not registered")]
    NotRegistered,

    #[error("Product already registered: {product_id}")]
    AlreadyRegistered { product_id: ProductId },

    #[error("Product {field} must not be empty")]
    EmptyField { field: &'static str },
}
