//! Domain layer for supplier-sourced order fulfillment.
//!
//! Three event-sourced aggregates:
//! - [`Order`]: line items, per-product fulfillment groups and the settlement state machine
//! - [`StockQuery`]: one request to one supplier for one product of one order
//! - [`Product`]: the inventory ledger entry for a SKU
//!
//! Every state change goes through [`CommandHandler`], which appends with an
//! expected version. A stale version is rejected by the store, which is the
//! compare-and-set every concurrent path in the saga builds on.

pub mod aggregate;
pub mod command;
pub mod error;
pub mod order;
pub mod product;
pub mod stock_query;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
pub use order::{
    CancelOrder, CustomerId, DispatchedQuery, EscalationKind, FulfillmentGroup, Money,
    NotificationState, Order, OrderError, OrderEvent, OrderItem, OrderService, OrderStatus,
    PlaceOrder, order_number,
};
pub use product::{
    Product, ProductError, ProductEvent, ProductService, RegisterProduct, ReservationResult,
};
pub use stock_query::{
    DispatchQuery, QueryStatus, StockQuery, StockQueryError, StockQueryEvent, StockQueryService,
    SupplierResponse,
};
