//! Product service: the event-sourced side of the inventory ledger.

use common::{AggregateId, ProductId};
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{Product, ProductEvent, RegisterProduct};

/// Outcome of taking stock for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationResult {
    pub requested: u32,
    pub reserved: u32,
    /// Stock left on the shelf after the reservation.
    pub remaining_stock: u32,
}

impl ReservationResult {
    /// Units the shelf could not cover.
    pub fn shortfall(&self) -> u32 {
        self.requested - self.reserved
    }
}

/// Service for managing product stock.
///
/// Every mutation runs as a compare-and-set loop on the product stream, so
/// concurrent reservations and credits on one SKU never lose an update.
pub struct ProductService<S: EventStore> {
    handler: CommandHandler<S, Product>,
}

impl<S: EventStore> ProductService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Product> {
        &self.handler
    }

    #[tracing::instrument(skip(self), fields(product_id = %cmd.product_id))]
    pub async fn register_product(
        &self,
        cmd: RegisterProduct,
    ) -> Result<CommandResult<Product>, DomainError> {
        let aggregate_id = cmd.aggregate_id();
        self.handler
            .execute(aggregate_id, |product| {
                product.register(
                    cmd.product_id.clone(),
                    cmd.name.clone(),
                    cmd.category.clone(),
                    cmd.quantity,
                    cmd.low_stock_threshold,
                )
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>, DomainError> {
        self.handler
            .load_existing(AggregateId::for_product(product_id))
            .await
    }

    /// Atomically takes `min(requested, on hand)` units for an order.
    #[tracing::instrument(skip(self))]
    pub async fn reserve_up_to(
        &self,
        product_id: &ProductId,
        order_id: AggregateId,
        requested: u32,
    ) -> Result<ReservationResult, DomainError> {
        let result = self
            .handler
            .execute_until_applied(AggregateId::for_product(product_id), |product| {
                product.reserve_up_to(order_id, requested)
            })
            .await?;

        let reserved = result
            .events
            .iter()
            .map(|event| match event {
                ProductEvent::StockReserved(data) => data.reserved,
                _ => 0,
            })
            .sum();

        if reserved > 0 {
            metrics::counter!("stock_reserved_units_total").increment(u64::from(reserved));
        }

        Ok(ReservationResult {
            requested,
            reserved,
            remaining_stock: result.aggregate.quantity(),
        })
    }

    /// Credits a supplier's confirmed units to stock, once per query.
    ///
    /// Returns `true` if this call applied the credit, `false` if it had
    /// already been applied.
    #[tracing::instrument(skip(self))]
    pub async fn receive_stock(
        &self,
        product_id: &ProductId,
        query_id: AggregateId,
        quantity: u32,
    ) -> Result<bool, DomainError> {
        let result = self
            .handler
            .execute_until_applied(AggregateId::for_product(product_id), |product| {
                product.receive(query_id, quantity)
            })
            .await?;

        Ok(!result.events.is_empty())
    }
}
