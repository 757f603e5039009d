//! Stock query aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, ProductId, SupplierId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::order::Money;

use super::{
    QueryStatus, StockQueryError, StockQueryEvent,
    events::{QueryDispatchedData, SupplierConfirmedData},
};

/// What a supplier answered, once they answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierResponse {
    pub available: bool,
    pub offered: u32,
    pub credited: u32,
    pub price: Option<Money>,
    pub lead_time_days: Option<u32>,
    pub responded_at: DateTime<Utc>,
}

/// A request to one supplier for part of one order's shortfall.
///
/// The remaining requirement only ever shrinks, and once the status leaves
/// `Pending` the query never changes again apart from audit records.
#[derive(Debug, Clone, Default)]
pub struct StockQuery {
    id: Option<AggregateId>,
    version: Version,
    order_id: Option<AggregateId>,
    product_id: Option<ProductId>,
    supplier_id: Option<SupplierId>,
    requested: u32,
    remaining: u32,
    status: QueryStatus,
    response: Option<SupplierResponse>,
    cancel_reason: Option<String>,
    created_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    ignored_responses: u32,
}

impl Aggregate for StockQuery {
    type Event = StockQueryEvent;
    type Error = StockQueryError;

    fn aggregate_type() -> &'static str {
        "StockQuery"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            StockQueryEvent::QueryDispatched(data) => self.apply_dispatched(data),
            StockQueryEvent::RequirementReduced(data) => {
                self.remaining = self.remaining.min(data.to);
            }
            StockQueryEvent::SupplierConfirmed(data) => self.apply_confirmed(data),
            StockQueryEvent::SupplierDeclined(data) => {
                self.status = QueryStatus::Unavailable;
                self.closed_at = Some(data.declined_at);
                self.response = Some(SupplierResponse {
                    available: false,
                    offered: 0,
                    credited: 0,
                    price: None,
                    lead_time_days: None,
                    responded_at: data.declined_at,
                });
            }
            StockQueryEvent::QueryCancelled(data) => {
                self.status = QueryStatus::Cancelled;
                self.cancel_reason = Some(data.reason);
                self.closed_at = Some(data.cancelled_at);
            }
            StockQueryEvent::QueryExpired(data) => {
                self.status = QueryStatus::Expired;
                self.closed_at = Some(data.expired_at);
            }
            StockQueryEvent::ResponseIgnored(_) => {
                self.ignored_responses += 1;
            }
        }
    }
}

// Query methods
impl StockQuery {
    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    pub fn product_id(&self) -> Option<&ProductId> {
        self.product_id.as_ref()
    }

    pub fn supplier_id(&self) -> Option<&SupplierId> {
        self.supplier_id.as_ref()
    }

    /// Quantity asked for at dispatch.
    pub fn requested(&self) -> u32 {
        self.requested
    }

    /// Quantity still asked of this supplier.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn status(&self) -> QueryStatus {
        self.status
    }

    pub fn response(&self) -> Option<&SupplierResponse> {
        self.response.as_ref()
    }

    /// Units this query contributed to inventory.
    pub fn credited(&self) -> u32 {
        match (&self.status, &self.response) {
            (QueryStatus::Available, Some(response)) => response.credited,
            _ => 0,
        }
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    /// Responses that arrived after the query was closed.
    pub fn ignored_responses(&self) -> u32 {
        self.ignored_responses
    }

    /// True if the query is still pending and its deadline has passed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status.is_pending() && self.expires_at.is_some_and(|at| now >= at)
    }
}

// Command methods
impl StockQuery {
    pub fn dispatch(
        &self,
        query_id: AggregateId,
        order_id: AggregateId,
        product_id: ProductId,
        supplier_id: SupplierId,
        quantity: u32,
        expires_at: DateTime<Utc>,
    ) -> Result<Vec<StockQueryEvent>, StockQueryError> {
        if self.id.is_some() {
            return Err(StockQueryError::AlreadyDispatched);
        }
        if quantity == 0 {
            return Err(StockQueryError::InvalidQuantity { quantity });
        }

        Ok(vec![StockQueryEvent::query_dispatched(
            query_id,
            order_id,
            product_id,
            supplier_id,
            quantity,
            expires_at,
        )])
    }

    /// Lowers the remaining requirement. Requests to raise it are ignored.
    pub fn reduce_requirement(&self, to: u32) -> Result<Vec<StockQueryEvent>, StockQueryError> {
        self.ensure_pending()?;

        if to >= self.remaining {
            return Ok(vec![]);
        }

        Ok(vec![StockQueryEvent::requirement_reduced(self.remaining, to)])
    }

    /// Records a positive response. `credited` must already be capped at
    /// what the order still needs.
    pub fn confirm(
        &self,
        offered: u32,
        credited: u32,
        price: Option<Money>,
        lead_time_days: Option<u32>,
    ) -> Result<Vec<StockQueryEvent>, StockQueryError> {
        self.ensure_pending()?;

        if credited == 0 {
            return Err(StockQueryError::InvalidQuantity { quantity: credited });
        }
        if credited > self.remaining {
            return Err(StockQueryError::CreditExceedsRequirement {
                credited,
                remaining: self.remaining,
            });
        }

        Ok(vec![StockQueryEvent::supplier_confirmed(
            offered,
            credited,
            price,
            lead_time_days,
        )])
    }

    pub fn decline(&self) -> Result<Vec<StockQueryEvent>, StockQueryError> {
        self.ensure_pending()?;
        Ok(vec![StockQueryEvent::supplier_declined()])
    }

    pub fn cancel(&self, reason: impl Into<String>) -> Result<Vec<StockQueryEvent>, StockQueryError> {
        self.ensure_pending()?;
        Ok(vec![StockQueryEvent::query_cancelled(reason)])
    }

    pub fn expire(&self, now: DateTime<Utc>) -> Result<Vec<StockQueryEvent>, StockQueryError> {
        self.ensure_pending()?;

        if let Some(expires_at) = self.expires_at
            && now < expires_at
        {
            return Err(StockQueryError::NotExpired { expires_at });
        }

        Ok(vec![StockQueryEvent::query_expired(now)])
    }

    /// Audits a response that reached an already closed query.
    pub fn record_ignored(
        &self,
        available: bool,
        quantity: u32,
    ) -> Result<Vec<StockQueryEvent>, StockQueryError> {
        if self.id.is_none() {
            return Err(StockQueryError::NotDispatched);
        }
        if self.status.is_pending() {
            return Err(StockQueryError::StillPending);
        }

        Ok(vec![StockQueryEvent::response_ignored(
            self.status,
            available,
            quantity,
        )])
    }

    fn ensure_pending(&self) -> Result<(), StockQueryError> {
        if self.id.is_none() {
            return Err(StockQueryError::NotDispatched);
        }
        if self.status.is_terminal() {
            return Err(StockQueryError::AlreadyTerminal {
                status: self.status,
            });
        }
        Ok(())
    }
}

// Apply event helpers
impl StockQuery {
    fn apply_dispatched(&mut self, data: QueryDispatchedData) {
        self.id = Some(data.query_id);
        self.order_id = Some(data.order_id);
        self.product_id = Some(data.product_id);
        self.supplier_id = Some(data.supplier_id);
        self.requested = data.quantity;
        self.remaining = data.quantity;
        self.status = QueryStatus::Pending;
        self.created_at = Some(data.created_at);
        self.expires_at = Some(data.expires_at);
    }

    fn apply_confirmed(&mut self, data: SupplierConfirmedData) {
        self.status = QueryStatus::Available;
        self.closed_at = Some(data.confirmed_at);
        self.response = Some(SupplierResponse {
            available: true,
            offered: data.offered,
            credited: data.credited,
            price: data.price,
            lead_time_days: data.lead_time_days,
            responded_at: data.confirmed_at,
        });
    }
}
