//! Value objects for the order domain.

use common::{AggregateId, ProductId, SupplierId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(Uuid);

impl CustomerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CustomerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Money amount represented in cents to avoid floating point issues.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Money {
    cents: i64,
}

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Whole currency units.
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Cents portion, always positive.
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents * i64::from(quantity),
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
    }
}

/// A line of an order.
///
/// `reserved_from_stock` is what the shelf covered when the order was
/// placed; the rest is the shortfall suppliers are asked for. Items never
/// change after placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub reserved_from_stock: u32,
}

impl OrderItem {
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price,
            reserved_from_stock: 0,
        }
    }

    pub fn with_reserved(mut self, reserved: u32) -> Self {
        self.reserved_from_stock = reserved;
        self
    }

    /// Units not covered by stock at placement.
    pub fn shortfall(&self) -> u32 {
        self.quantity.saturating_sub(self.reserved_from_stock)
    }

    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A query sent for a fulfillment group, as recorded on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchedQuery {
    pub query_id: AggregateId,
    pub supplier_id: SupplierId,
}

/// Why automatic sourcing of a group stalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EscalationKind {
    /// No active supplier carries the product's category.
    Unsourceable,
    /// Every supplier answered and none had stock.
    AllSuppliersDeclined,
    /// Suppliers delivered some units but not enough.
    SupplyExhausted,
    /// The group ran out of pending queries because they expired.
    QueriesExpired,
}

impl EscalationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationKind::Unsourceable => "Unsourceable",
            EscalationKind::AllSuppliersDeclined => "AllSuppliersDeclined",
            EscalationKind::SupplyExhausted => "SupplyExhausted",
            EscalationKind::QueriesExpired => "QueriesExpired",
        }
    }
}

impl std::fmt::Display for EscalationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "$12.34");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-$12.34");
    }

    #[test]
    fn money_arithmetic() {
        let mut total = Money::from_cents(1000) + Money::from_cents(500);
        total += Money::from_cents(1).multiply(3);
        assert_eq!(total.cents(), 1503);
    }

    #[test]
    fn item_shortfall_is_quantity_minus_reserved() {
        let item = OrderItem::new("SKU-1", "Widget", 10, Money::from_cents(100)).with_reserved(4);
        assert_eq!(item.shortfall(), 6);
        assert_eq!(item.total_price().cents(), 1000);

        let covered = OrderItem::new("SKU-1", "Widget", 3, Money::zero()).with_reserved(3);
        assert_eq!(covered.shortfall(), 0);
    }

    #[test]
    fn order_item_serialization() {
        let item = OrderItem::new("SKU-001", "Widget", 2, Money::from_cents(999)).with_reserved(1);
        let json = serde_json::to_string(&item).unwrap();
        let deserialized: OrderItem = serde_json::from_str(&json).unwrap();
        assert_eq!(item, deserialized);
    }
}
