//! Stock query status.

use serde::{Deserialize, Serialize};

/// Lifecycle of a supplier query.
///
/// ```text
/// Pending ──┬──► Available
///           ├──► Unavailable
///           ├──► Cancelled
///           └──► Expired
/// ```
///
/// Every status other than `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QueryStatus {
    /// Waiting for the supplier to answer.
    #[default]
    Pending,

    /// The supplier confirmed stock and the credit was recorded.
    Available,

    /// The supplier declined.
    Unavailable,

    /// No longer needed: fulfilled elsewhere or the order was cancelled.
    Cancelled,

    /// The supplier did not answer before the deadline.
    Expired,
}

impl QueryStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, QueryStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Pending => "Pending",
            QueryStatus::Available => "Available",
            QueryStatus::Unavailable => "Unavailable",
            QueryStatus::Cancelled => "Cancelled",
            QueryStatus::Expired => "Expired",
        }
    }
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
