//! Order commands.

use chrono::{DateTime, Utc};
use common::AggregateId;

use crate::command::Command;

use super::{CustomerId, Order, OrderItem};

/// Command to place an order whose items already carry their stock
/// reservations.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub order_id: AggregateId,
    pub customer_id: CustomerId,
    pub items: Vec<OrderItem>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

impl PlaceOrder {
    pub fn new(order_id: AggregateId, customer_id: CustomerId, items: Vec<OrderItem>) -> Self {
        Self {
            order_id,
            customer_id,
            items,
            estimated_delivery: None,
        }
    }

    pub fn with_estimated_delivery(mut self, at: DateTime<Utc>) -> Self {
        self.estimated_delivery = Some(at);
        self
    }
}

impl Command for PlaceOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to cancel an order.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: AggregateId,
    pub reason: String,
}

impl CancelOrder {
    pub fn new(order_id: AggregateId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            reason: reason.into(),
        }
    }
}

impl Command for CancelOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}
