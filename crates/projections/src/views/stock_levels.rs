//! Stock levels per SKU, built from the inventory ledger's events.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, ProductId};
use domain::ProductEvent;
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

#[derive(Debug, Clone, Serialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    /// Units on hand.
    pub quantity: u32,
    pub low_stock_threshold: u32,
    /// Units handed to orders since registration.
    pub reserved_total: u64,
    /// Units credited from supplier confirmations since registration.
    pub received_total: u64,
}

impl StockLevel {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.low_stock_threshold
    }
}

struct StockLevelsState {
    products: BTreeMap<ProductId, StockLevel>,
    /// Product events are keyed by aggregate id; this maps them back to SKUs.
    skus: HashMap<AggregateId, ProductId>,
    position: ProjectionPosition,
}

#[derive(Clone)]
pub struct StockLevelsView {
    state: Arc<RwLock<StockLevelsState>>,
}

impl StockLevelsView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StockLevelsState {
                products: BTreeMap::new(),
                skus: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    pub async fn get(&self, product_id: &ProductId) -> Option<StockLevel> {
        self.state.read().await.products.get(product_id).cloned()
    }

    /// Every registered product, ordered by SKU.
    pub async fn all(&self) -> Vec<StockLevel> {
        self.state.read().await.products.values().cloned().collect()
    }

    /// Products at or below their low-stock threshold.
    pub async fn low_stock(&self) -> Vec<StockLevel> {
        self.state
            .read()
            .await
            .products
            .values()
            .filter(|p| p.is_low_stock())
            .cloned()
            .collect()
    }
}

impl Default for StockLevelsView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for StockLevelsView {
    fn name(&self) -> &'static str {
        "StockLevelsView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        state.position = state.position.advance_to(event.position);
        if event.aggregate_type != "Product" {
            return Ok(());
        }

        let product_event: ProductEvent = serde_json::from_value(event.payload.clone())?;

        match product_event {
            ProductEvent::ProductRegistered(data) => {
                state
                    .skus
                    .insert(event.aggregate_id, data.product_id.clone());
                state.products.insert(
                    data.product_id.clone(),
                    StockLevel {
                        product_id: data.product_id,
                        name: data.name,
                        category: data.category,
                        quantity: data.quantity,
                        low_stock_threshold: data.low_stock_threshold,
                        reserved_total: 0,
                        received_total: 0,
                    },
                );
            }
            ProductEvent::StockReserved(data) => {
                let Some(sku) = state.skus.get(&event.aggregate_id).cloned() else {
                    tracing::warn!(aggregate_id = %event.aggregate_id, "reservation for unknown product");
                    return Ok(());
                };
                if let Some(level) = state.products.get_mut(&sku) {
                    level.quantity = level.quantity.saturating_sub(data.reserved);
                    level.reserved_total += u64::from(data.reserved);
                }
            }
            ProductEvent::StockReceived(data) => {
                let Some(sku) = state.skus.get(&event.aggregate_id).cloned() else {
                    tracing::warn!(aggregate_id = %event.aggregate_id, "receipt for unknown product");
                    return Ok(());
                };
                if let Some(level) = state.products.get_mut(&sku) {
                    level.quantity += data.quantity;
                    level.received_total += u64::from(data.quantity);
                }
            }
        }

        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.products.clear();
        state.skus.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for StockLevelsView {
    fn name(&self) -> &'static str {
        "StockLevelsView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.products.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use domain::DomainEvent;
    use domain::product::{ProductRegisteredData, StockReceivedData, StockReservedData};
    use event_store::Version;

    use super::*;

    fn envelope(sku: &ProductId, version: i64, event: &ProductEvent) -> EventEnvelope {
        let mut env = EventEnvelope::builder()
            .aggregate_id(AggregateId::for_product(sku))
            .aggregate_type("Product")
            .event_type(event.event_type())
            .version(Version::new(version))
            .payload(event)
            .unwrap()
            .build()
            .unwrap();
        env.position = version as u64;
        env
    }

    fn registered(sku: &ProductId, quantity: u32) -> ProductEvent {
        ProductEvent::ProductRegistered(ProductRegisteredData {
            product_id: sku.clone(),
            name: "22K Gold Ring".into(),
            category: "rings".into(),
            quantity,
            low_stock_threshold: 5,
            registered_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn reservations_and_receipts_move_quantity() {
        let view = StockLevelsView::new();
        let sku = ProductId::new("RING-22K");

        view.handle(&envelope(&sku, 1, &registered(&sku, 8))).await.unwrap();
        let reserved = ProductEvent::StockReserved(StockReservedData {
            order_id: AggregateId::new(),
            requested: 10,
            reserved: 8,
            reserved_at: Utc::now(),
        });
        view.handle(&envelope(&sku, 2, &reserved)).await.unwrap();

        let level = view.get(&sku).await.unwrap();
        assert_eq!(level.quantity, 0);
        assert_eq!(level.reserved_total, 8);
        assert_eq!(view.low_stock().await.len(), 1);

        let received = ProductEvent::StockReceived(StockReceivedData {
            query_id: AggregateId::new(),
            quantity: 12,
            received_at: Utc::now(),
        });
        view.handle(&envelope(&sku, 3, &received)).await.unwrap();

        let level = view.get(&sku).await.unwrap();
        assert_eq!(level.quantity, 12);
        assert_eq!(level.received_total, 12);
        assert!(view.low_stock().await.is_empty());
    }

    #[tokio::test]
    async fn reset_clears_products() {
        let view = StockLevelsView::new();
        let sku = ProductId::new("RING-22K");
        view.handle(&envelope(&sku, 1, &registered(&sku, 3))).await.unwrap();

        view.reset().await.unwrap();
        assert!(view.all().await.is_empty());
        assert_eq!(view.position().await, ProjectionPosition::zero());
    }
}
