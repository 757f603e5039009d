//! Shortage detection and stock reservation at placement.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use common::{AggregateId, ProductId};
use domain::{Money, OrderItem};
use serde::Deserialize;

use crate::error::{Result, SagaError};
use crate::services::InventoryLedger;

/// One requested line of a new order.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }
}

/// Units a line needs beyond what stock covered.
pub fn shortfall(needed: u32, available: u32) -> u32 {
    needed.saturating_sub(available)
}

/// Items of a new order with their stock reservations applied.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub items: Vec<OrderItem>,
    /// Category of every product with a shortfall, for supplier selection.
    pub categories: BTreeMap<ProductId, String>,
}

impl Assessment {
    pub fn has_shortfall(&self) -> bool {
        self.items.iter().any(|item| item.shortfall() > 0)
    }
}

/// Reserves on-hand stock for a new order and reports what is left over.
pub struct ShortageDetector {
    inventory: Arc<dyn InventoryLedger>,
}

impl ShortageDetector {
    pub fn new(inventory: Arc<dyn InventoryLedger>) -> Self {
        Self { inventory }
    }

    /// Validates every line, then reserves `min(needed, on hand)` per line.
    ///
    /// Nothing is reserved unless every line is valid and every product
    /// exists.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn assess(&self, order_id: AggregateId, lines: &[OrderLine]) -> Result<Assessment> {
        if lines.is_empty() {
            return Err(SagaError::InvalidOrder("order has no items".to_string()));
        }

        let mut seen = HashSet::new();
        let mut snapshots = Vec::with_capacity(lines.len());
        for line in lines {
            if line.quantity == 0 {
                return Err(SagaError::InvalidOrder(format!(
                    "quantity for {} must be greater than 0",
                    line.product_id
                )));
            }
            if line.unit_price.is_negative() {
                return Err(SagaError::InvalidOrder(format!(
                    "price for {} must not be negative",
                    line.product_id
                )));
            }
            if !seen.insert(&line.product_id) {
                return Err(SagaError::InvalidOrder(format!(
                    "{} appears more than once",
                    line.product_id
                )));
            }
            let snapshot = self
                .inventory
                .snapshot(&line.product_id)
                .await?
                .ok_or_else(|| SagaError::ProductNotFound(line.product_id.clone()))?;
            snapshots.push(snapshot);
        }

        let mut items = Vec::with_capacity(lines.len());
        let mut categories = BTreeMap::new();
        for (line, snapshot) in lines.iter().zip(snapshots) {
            let reserved = self
                .inventory
                .reserve_up_to(&line.product_id, order_id, line.quantity)
                .await?;
            let short = shortfall(line.quantity, reserved);
            if short > 0 {
                tracing::info!(
                    product_id = %line.product_id,
                    needed = line.quantity,
                    reserved,
                    shortfall = short,
                    "stock shortfall"
                );
                categories.insert(line.product_id.clone(), snapshot.category);
            }
            items.push(
                OrderItem::new(
                    line.product_id.clone(),
                    snapshot.name,
                    line.quantity,
                    line.unit_price,
                )
                .with_reserved(reserved),
            );
        }

        Ok(Assessment { items, categories })
    }
}

#[cfg(test)]
mod tests {
    use domain::RegisterProduct;
    use event_store::InMemoryEventStore;

    use super::*;
    use crate::services::EventSourcedInventory;

    async fn detector() -> (ShortageDetector, Arc<dyn InventoryLedger>) {
        let inventory: Arc<dyn InventoryLedger> =
            Arc::new(EventSourcedInventory::new(InMemoryEventStore::new()));
        inventory
            .register(RegisterProduct::new("RING", "Gold Ring", "jewellery", 4))
            .await
            .unwrap();
        inventory
            .register(RegisterProduct::new("CHAIN", "Silver Chain", "jewellery", 50))
            .await
            .unwrap();
        (ShortageDetector::new(Arc::clone(&inventory)), inventory)
    }

    #[test]
    fn test_shortfall_never_negative() {
        assert_eq!(shortfall(10, 4), 6);
        assert_eq!(shortfall(3, 8), 0);
    }

    #[tokio::test]
    async fn test_assess_reserves_and_reports_shortfall() {
        let (detector, inventory) = detector().await;
        let lines = vec![
            OrderLine::new("RING", 10, Money::from_cents(5_000)),
            OrderLine::new("CHAIN", 2, Money::from_cents(1_500)),
        ];

        let assessment = detector.assess(AggregateId::new(), &lines).await.unwrap();

        assert!(assessment.has_shortfall());
        assert_eq!(assessment.items[0].reserved_from_stock, 4);
        assert_eq!(assessment.items[0].shortfall(), 6);
        assert_eq!(assessment.items[1].shortfall(), 0);
        assert_eq!(assessment.categories.len(), 1);

        let ring = inventory.snapshot(&ProductId::new("RING")).await.unwrap().unwrap();
        assert_eq!(ring.quantity, 0);
    }

    #[tokio::test]
    async fn test_unknown_product_reserves_nothing() {
        let (detector, inventory) = detector().await;
        let lines = vec![
            OrderLine::new("CHAIN", 2, Money::from_cents(1_500)),
            OrderLine::new("GHOST", 1, Money::from_cents(100)),
        ];

        let err = detector.assess(AggregateId::new(), &lines).await.unwrap_err();
        assert!(matches!(err, SagaError::ProductNotFound(id) if id.as_str() == "GHOST"));

        let chain = inventory.snapshot(&ProductId::new("CHAIN")).await.unwrap().unwrap();
        assert_eq!(chain.quantity, 50);
    }

    #[tokio::test]
    async fn test_rejects_invalid_lines() {
        let (detector, _) = detector().await;

        let err = detector.assess(AggregateId::new(), &[]).await.unwrap_err();
        assert!(matches!(err, SagaError::InvalidOrder(_)));

        let zero = vec![OrderLine::new("RING", 0, Money::from_cents(100))];
        assert!(matches!(
            detector.assess(AggregateId::new(), &zero).await,
            Err(SagaError::InvalidOrder(_))
        ));

        let duplicate = vec![
            OrderLine::new("RING", 1, Money::from_cents(100)),
            OrderLine::new("RING", 2, Money::from_cents(100)),
        ];
        assert!(matches!(
            detector.assess(AggregateId::new(), &duplicate).await,
            Err(SagaError::InvalidOrder(_))
        ));
    }
}
