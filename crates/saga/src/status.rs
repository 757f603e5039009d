//! Read-side views the saga returns to callers.

use chrono::{DateTime, Utc};
use common::{AggregateId, ProductId, SupplierId};
use domain::{
    Aggregate, CustomerId, EscalationKind, FulfillmentGroup, Money, NotificationState, Order,
    OrderStatus, QueryStatus, StockQuery,
};
use serde::Serialize;

/// Number of queries of a fulfillment group in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryCounts {
    pub pending: u32,
    pub available: u32,
    pub unavailable: u32,
    pub cancelled: u32,
    pub expired: u32,
}

impl QueryCounts {
    fn record(&mut self, status: QueryStatus) {
        match status {
            QueryStatus::Pending => self.pending += 1,
            QueryStatus::Available => self.available += 1,
            QueryStatus::Unavailable => self.unavailable += 1,
            QueryStatus::Cancelled => self.cancelled += 1,
            QueryStatus::Expired => self.expired += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.pending + self.available + self.unavailable + self.cancelled + self.expired
    }
}

/// A query of a group that can still be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingQuery {
    pub query_id: AggregateId,
    pub supplier_id: SupplierId,
    pub remaining: u32,
}

/// State of one fulfillment group, folded from its queries.
#[derive(Debug, Clone, Default)]
pub(crate) struct GroupTally {
    pub needed: u32,
    pub credited: u32,
    pub counts: QueryCounts,
    pub pending: Vec<PendingQuery>,
    /// Longest lead time quoted by a crediting supplier.
    pub max_lead_time_days: Option<u32>,
}

impl GroupTally {
    pub fn from_queries<'a>(
        group: &FulfillmentGroup,
        queries: impl IntoIterator<Item = &'a StockQuery>,
    ) -> Self {
        let mut tally = Self {
            needed: group.needed,
            ..Self::default()
        };

        for query in queries {
            let status = query.status();
            tally.counts.record(status);
            match status {
                QueryStatus::Pending => {
                    if let (Some(query_id), Some(supplier_id)) = (query.id(), query.supplier_id()) {
                        tally.pending.push(PendingQuery {
                            query_id,
                            supplier_id: supplier_id.clone(),
                            remaining: query.remaining(),
                        });
                    }
                }
                QueryStatus::Available => {
                    tally.credited += query.credited();
                    if let Some(days) = query.response().and_then(|r| r.lead_time_days) {
                        tally.max_lead_time_days =
                            Some(tally.max_lead_time_days.map_or(days, |d| d.max(days)));
                    }
                }
                _ => {}
            }
        }

        tally
    }

    /// Units still to be sourced.
    pub fn remaining_need(&self) -> u32 {
        self.needed.saturating_sub(self.credited)
    }

    pub fn is_satisfied(&self) -> bool {
        self.credited >= self.needed && self.counts.pending == 0
    }

    /// Every query answered or closed and the need is still unmet.
    pub fn is_exhausted(&self) -> bool {
        self.counts.total() > 0 && self.counts.pending == 0 && self.credited < self.needed
    }

    /// Which escalation an exhausted group warrants.
    pub fn exhaustion_kind(&self) -> EscalationKind {
        if self.counts.expired > 0 {
            EscalationKind::QueriesExpired
        } else if self.credited == 0 {
            EscalationKind::AllSuppliersDeclined
        } else {
            EscalationKind::SupplyExhausted
        }
    }
}

/// Per-product line of an order status.
#[derive(Debug, Clone, Serialize)]
pub struct ProductBreakdown {
    pub product_id: ProductId,
    pub product_name: String,
    pub ordered: u32,
    pub reserved_from_stock: u32,
    pub shortfall: u32,
    pub credited: u32,
    pub remaining: u32,
    pub queries: QueryCounts,
    pub escalations: Vec<EscalationKind>,
}

/// What `get_order_status` returns.
#[derive(Debug, Clone, Serialize)]
pub struct OrderStatusView {
    pub order_id: AggregateId,
    pub order_number: String,
    pub customer_id: Option<CustomerId>,
    pub status: OrderStatus,
    pub awaiting_supplier: bool,
    pub total_amount: Money,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub notification: NotificationState,
    pub placed_at: Option<DateTime<Utc>>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub products: Vec<ProductBreakdown>,
}

impl OrderStatusView {
    pub(crate) fn build(
        order_id: AggregateId,
        order: &Order,
        tally_for: impl Fn(&ProductId) -> Option<GroupTally>,
    ) -> Self {
        let products = order
            .items()
            .iter()
            .map(|item| {
                let tally = tally_for(&item.product_id).unwrap_or_default();
                ProductBreakdown {
                    product_id: item.product_id.clone(),
                    product_name: item.product_name.clone(),
                    ordered: item.quantity,
                    reserved_from_stock: item.reserved_from_stock,
                    shortfall: item.shortfall(),
                    credited: tally.credited,
                    remaining: tally.remaining_need(),
                    queries: tally.counts,
                    escalations: order
                        .group(&item.product_id)
                        .map(|group| group.escalations.iter().copied().collect())
                        .unwrap_or_default(),
                }
            })
            .collect();

        Self {
            order_id,
            order_number: order.order_number(),
            customer_id: order.customer_id(),
            status: order.status(),
            awaiting_supplier: order.awaiting_supplier(),
            total_amount: order.total_amount(),
            estimated_delivery: order.estimated_delivery(),
            notification: order.notification(),
            placed_at: order.placed_at(),
            fulfilled_at: order.fulfilled_at(),
            cancel_reason: order.cancel_reason().map(str::to_string),
            products,
        }
    }

    pub fn product(&self, product_id: &ProductId) -> Option<&ProductBreakdown> {
        self.products.iter().find(|p| &p.product_id == product_id)
    }
}

/// One supplier query as seen by callers.
#[derive(Debug, Clone, Serialize)]
pub struct QueryView {
    pub query_id: AggregateId,
    pub order_id: Option<AggregateId>,
    pub product_id: Option<ProductId>,
    pub supplier_id: Option<SupplierId>,
    pub status: QueryStatus,
    pub requested: u32,
    pub remaining: u32,
    pub offered: Option<u32>,
    pub credited: u32,
    pub price: Option<Money>,
    pub lead_time_days: Option<u32>,
    pub cancel_reason: Option<String>,
    pub ignored_responses: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl QueryView {
    pub(crate) fn from_query(query_id: AggregateId, query: &StockQuery) -> Self {
        let response = query.response();
        Self {
            query_id,
            order_id: query.order_id(),
            product_id: query.product_id().cloned(),
            supplier_id: query.supplier_id().cloned(),
            status: query.status(),
            requested: query.requested(),
            remaining: query.remaining(),
            offered: response.filter(|r| r.available).map(|r| r.offered),
            credited: query.credited(),
            price: response.and_then(|r| r.price),
            lead_time_days: response.and_then(|r| r.lead_time_days),
            cancel_reason: query.cancel_reason().map(str::to_string),
            ignored_responses: query.ignored_responses(),
            created_at: query.created_at(),
            expires_at: query.expires_at(),
            closed_at: query.closed_at(),
        }
    }
}
