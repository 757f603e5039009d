//! Order settlement state machine.

use serde::{Deserialize, Serialize};

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► AwaitingStock ──► Fulfilled
///    │              │
///    └──────────────┴──► Cancelled
/// ```
///
/// An order whose items were all covered by stock stays `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Placed, nothing outstanding from suppliers.
    #[default]
    Pending,

    /// At least one item is waiting on supplier stock.
    AwaitingStock,

    /// Every shortfall was covered by suppliers (terminal state).
    Fulfilled,

    /// Cancelled by an operator (terminal state).
    Cancelled,
}

impl OrderStatus {
    pub fn can_fulfill(&self) -> bool {
        matches!(self, OrderStatus::AwaitingStock)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::AwaitingStock)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Fulfilled | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::AwaitingStock => "AwaitingStock",
            OrderStatus::Fulfilled => "Fulfilled",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Delivery state of the "order ready" message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NotificationState {
    /// The order has not been fulfilled by suppliers.
    #[default]
    NotRequired,
    /// Fulfilled; a send is owed or in flight.
    Pending,
    Delivered,
    /// Every attempt failed; eligible for a later retry.
    Failed,
}

impl NotificationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationState::NotRequired => "NotRequired",
            NotificationState::Pending => "Pending",
            NotificationState::Delivered => "Delivered",
            NotificationState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for NotificationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_only_awaiting_stock_can_fulfill() {
        assert!(!OrderStatus::Pending.can_fulfill());
        assert!(OrderStatus::AwaitingStock.can_fulfill());
        assert!(!OrderStatus::Fulfilled.can_fulfill());
        assert!(!OrderStatus::Cancelled.can_fulfill());
    }

    #[test]
    fn test_can_cancel_from_non_terminal_states() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(OrderStatus::AwaitingStock.can_cancel());
        assert!(!OrderStatus::Fulfilled.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::AwaitingStock.is_terminal());
        assert!(OrderStatus::Fulfilled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&OrderStatus::AwaitingStock).unwrap();
        assert_eq!(json, "\"AwaitingStock\"");
        let back: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OrderStatus::AwaitingStock);
        assert_eq!(NotificationState::Failed.to_string(), "Failed");
    }
}
