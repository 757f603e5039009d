//! Stock query commands.

use chrono::{DateTime, Utc};
use common::{AggregateId, ProductId, SupplierId};

use crate::command::Command;

use super::StockQuery;

/// Command to open a query to a supplier.
///
/// The query id is chosen by the caller so the order can record it before
/// the query exists.
#[derive(Debug, Clone)]
pub struct DispatchQuery {
    pub query_id: AggregateId,
    pub order_id: AggregateId,
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub quantity: u32,
    pub expires_at: DateTime<Utc>,
}

impl Command for DispatchQuery {
    type Aggregate = StockQuery;

    fn aggregate_id(&self) -> AggregateId {
        self.query_id
    }
}
