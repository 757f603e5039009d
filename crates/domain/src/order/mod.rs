//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::{FulfillmentGroup, Order, order_number};
pub use commands::{CancelOrder, PlaceOrder};
pub use events::{
    CustomerNotificationFailedData, CustomerNotifiedData, NotificationRetryClaimedData,
    OrderCancelledData, OrderEvent, OrderFulfilledData, OrderPlacedData, QueriesDispatchedData,
    ShortfallRecordedData, SourcingEscalatedData,
};
pub use service::OrderService;
pub use state::{NotificationState, OrderStatus};
pub use value_objects::{CustomerId, DispatchedQuery, EscalationKind, Money, OrderItem};

use common::ProductId;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order has not been placed")]
    NotPlaced,

    #[error("Order already placed")]
    AlreadyPlaced,

    #[error("Invalid state transition: cannot {action} from {current_status} status")]
    InvalidStateTransition {
        current_status: OrderStatus,
        action: &'static str,
    },

    #[error("Order has no items")]
    NoItems,

    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    #[error("Invalid price: {price} (must not be negative)")]
    InvalidPrice { price: i64 },

    #[error("Product {product_id} appears more than once")]
    DuplicateItem { product_id: ProductId },

    #[error("More stock reserved than ordered for {product_id}")]
    OverReserved { product_id: ProductId },

    /// The product was fully covered by stock, so it has no fulfillment group.
    #[error("Order has no shortfall for {product_id}")]
    NoShortfall { product_id: ProductId },

    #[error("Notification is {actual}, expected {expected}")]
    UnexpectedNotificationState {
        expected: NotificationState,
        actual: NotificationState,
    },
}
