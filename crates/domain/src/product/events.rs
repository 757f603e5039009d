//! Product domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, ProductId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// Events that can occur on a product aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProductEvent {
    ProductRegistered(ProductRegisteredData),

    /// Units were taken out of stock for an order.
    StockReserved(StockReservedData),

    /// Units a supplier confirmed were added to stock.
    StockReceived(StockReceivedData),
}

impl DomainEvent for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductRegistered(_) => "ProductRegistered",
            ProductEvent::StockReserved(_) => "StockReserved",
            ProductEvent::StockReceived(_) => "StockReceived",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRegisteredData {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    /// Opening stock.
    pub quantity: u32,
    pub low_stock_threshold: u32,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReservedData {
    pub order_id: AggregateId,
    /// What the order asked for.
    pub requested: u32,
    /// What was actually taken, never more than was on hand.
    pub reserved: u32,
    pub reserved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReceivedData {
    /// The supplier query whose confirmation this credit settles.
    pub query_id: AggregateId,
    pub quantity: u32,
    pub received_at: DateTime<Utc>,
}

impl ProductEvent {
    pub fn product_registered(
        product_id: ProductId,
        name: String,
        category: String,
        quantity: u32,
        low_stock_threshold: u32,
    ) -> Self {
        ProductEvent::ProductRegistered(ProductRegisteredData {
            product_id,
            name,
            category,
            quantity,
            low_stock_threshold,
            registered_at: Utc::now(),
        })
    }

    pub fn stock_reserved(order_id: AggregateId, requested: u32, reserved: u32) -> Self {
        ProductEvent::StockReserved(StockReservedData {
            order_id,
            requested,
            reserved,
            reserved_at: Utc::now(),
        })
    }

    pub fn stock_received(query_id: AggregateId, quantity: u32) -> Self {
        ProductEvent::StockReceived(StockReceivedData {
            query_id,
            quantity,
            received_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_types() {
        let event = ProductEvent::product_registered(
            ProductId::new("RING-22K"),
            "Gold ring".into(),
            "jewellery".into(),
            3,
            5,
        );
        assert_eq!(event.event_type(), "ProductRegistered");
        assert_eq!(
            ProductEvent::stock_reserved(AggregateId::new(), 4, 3).event_type(),
            "StockReserved"
        );
        assert_eq!(
            ProductEvent::stock_received(AggregateId::new(), 6).event_type(),
            "StockReceived"
        );
    }

    #[test]
    fn stock_received_serialization() {
        let query_id = AggregateId::new();
        let json = serde_json::to_value(ProductEvent::stock_received(query_id, 6)).unwrap();
        assert_eq!(json["type"], "StockReceived");
        assert_eq!(json["data"]["quantity"], 6);

        let back: ProductEvent = serde_json::from_value(json).unwrap();
        match back {
            ProductEvent::StockReceived(data) => assert_eq!(data.query_id, query_id),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
