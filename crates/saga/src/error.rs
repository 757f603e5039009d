//! Saga error types.

use common::{AggregateId, ProductId};
use domain::{DomainError, OrderError, ProductError, StockQueryError};
use event_store::EventStoreError;
use thiserror::Error;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// No stock query exists with this id.
    #[error("Stock query not found: {0}")]
    QueryNotFound(AggregateId),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(AggregateId),

    /// The product is not in the catalogue.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The order request itself is malformed.
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// The order cannot take the requested action in its current state.
    #[error("Order not ready: {0}")]
    OrderNotReady(String),

    /// Inventory ledger error.
    #[error("Inventory ledger error: {0}")]
    Inventory(String),

    /// Supplier directory error.
    #[error("Supplier directory error: {0}")]
    SupplierDirectory(String),

    /// Supplier messaging error.
    #[error("Supplier messaging error: {0}")]
    Messaging(String),

    /// The customer could not be told the order is ready.
    #[error("Customer notification failed after {attempts} attempts: {reason}")]
    Notification { attempts: u32, reason: String },

    /// Escalation channel error.
    #[error("Escalation error: {0}")]
    Escalation(String),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Event store error.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),
}

impl SagaError {
    /// True when the caller asked for something the current state forbids,
    /// as opposed to a missing record or an infrastructure failure.
    pub fn is_invalid_transition(&self) -> bool {
        match self {
            SagaError::OrderNotReady(_) => true,
            SagaError::Domain(DomainError::Order(
                OrderError::InvalidStateTransition { .. }
                | OrderError::UnexpectedNotificationState { .. }
                | OrderError::NoShortfall { .. },
            )) => true,
            SagaError::Domain(DomainError::StockQuery(StockQueryError::AlreadyTerminal { .. })) => {
                true
            }
            SagaError::Domain(DomainError::Product(ProductError::AlreadyRegistered { .. })) => true,
            SagaError::Domain(e) => e.is_conflict(),
            SagaError::EventStore(e) => e.is_conflict(),
            _ => false,
        }
    }

    /// True when the request payload was rejected by validation.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            SagaError::InvalidOrder(_)
                | SagaError::Domain(DomainError::Order(
                    OrderError::NoItems
                        | OrderError::InvalidQuantity { .. }
                        | OrderError::InvalidPrice { .. }
                        | OrderError::DuplicateItem { .. }
                ))
                | SagaError::Domain(DomainError::Product(ProductError::EmptyField { .. }))
                | SagaError::Domain(DomainError::StockQuery(
                    StockQueryError::InvalidQuantity { .. }
                ))
        )
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

/// Narrows a stock query error to `AlreadyTerminal`, the outcome of losing a
/// race for the query's single terminal transition.
pub(crate) fn lost_terminal_race(err: &SagaError) -> bool {
    matches!(
        err,
        SagaError::Domain(DomainError::StockQuery(StockQueryError::AlreadyTerminal { .. }))
    )
}
