//! Stock query aggregate: one request to one supplier for one product of
//! one order.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;

pub use aggregate::{StockQuery, SupplierResponse};
pub use commands::DispatchQuery;
pub use events::{
    QueryCancelledData, QueryDispatchedData, QueryExpiredData, RequirementReducedData,
    ResponseIgnoredData, StockQueryEvent, SupplierConfirmedData, SupplierDeclinedData,
};
pub use service::StockQueryService;
pub use state::QueryStatus;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during stock query operations.
#[derive(Debug, Error)]
pub enum StockQueryError {
    #[error("Stock query has not been dispatched")]
    NotDispatched,

    #[error("Stock query already dispatched")]
    AlreadyDispatched,

    /// The query already reached a terminal status; it never changes again.
    #[error("Stock query is already {status}")]
    AlreadyTerminal { status: QueryStatus },

    #[error("Stock query is still pending")]
    StillPending,

    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    #[error("Cannot credit {credited} units, only {remaining} still required")]
    CreditExceedsRequirement { credited: u32, remaining: u32 },

    #[error("Stock query does not expire until {expires_at}")]
    NotExpired { expires_at: DateTime<Utc> },
}
