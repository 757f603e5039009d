//! Stock query domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, ProductId, SupplierId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::order::Money;

use super::QueryStatus;

/// Events that can occur on a stock query aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StockQueryEvent {
    QueryDispatched(QueryDispatchedData),

    /// A sibling supplier covered part of the need.
    RequirementReduced(RequirementReducedData),

    SupplierConfirmed(SupplierConfirmedData),

    SupplierDeclined(SupplierDeclinedData),

    QueryCancelled(QueryCancelledData),

    QueryExpired(QueryExpiredData),

    /// A response arrived after the query was already terminal. Kept for audit.
    ResponseIgnored(ResponseIgnoredData),
}

impl DomainEvent for StockQueryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockQueryEvent::QueryDispatched(_) => "QueryDispatched",
            StockQueryEvent::RequirementReduced(_) => "RequirementReduced",
            StockQueryEvent::SupplierConfirmed(_) => "SupplierConfirmed",
            StockQueryEvent::SupplierDeclined(_) => "SupplierDeclined",
            StockQueryEvent::QueryCancelled(_) => "QueryCancelled",
            StockQueryEvent::QueryExpired(_) => "QueryExpired",
            StockQueryEvent::ResponseIgnored(_) => "ResponseIgnored",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDispatchedData {
    pub query_id: AggregateId,
    pub order_id: AggregateId,
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementReducedData {
    pub from: u32,
    pub to: u32,
    pub reduced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierConfirmedData {
    /// What the supplier said they could ship.
    pub offered: u32,
    /// The part of the offer applied to inventory.
    pub credited: u32,
    pub price: Option<Money>,
    pub lead_time_days: Option<u32>,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierDeclinedData {
    pub declined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryCancelledData {
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryExpiredData {
    pub expired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseIgnoredData {
    /// Status of the query when the response arrived.
    pub status: QueryStatus,
    pub available: bool,
    pub quantity: u32,
    pub received_at: DateTime<Utc>,
}

impl StockQueryEvent {
    pub fn query_dispatched(
        query_id: AggregateId,
        order_id: AggregateId,
        product_id: ProductId,
        supplier_id: SupplierId,
        quantity: u32,
        expires_at: DateTime<Utc>,
    ) -> Self {
        StockQueryEvent::QueryDispatched(QueryDispatchedData {
            query_id,
            order_id,
            product_id,
            supplier_id,
            quantity,
            created_at: Utc::now(),
            expires_at,
        })
    }

    pub fn requirement_reduced(from: u32, to: u32) -> Self {
        StockQueryEvent::RequirementReduced(RequirementReducedData {
            from,
            to,
            reduced_at: Utc::now(),
        })
    }

    pub fn supplier_confirmed(
        offered: u32,
        credited: u32,
        price: Option<Money>,
        lead_time_days: Option<u32>,
    ) -> Self {
        StockQueryEvent::SupplierConfirmed(SupplierConfirmedData {
            offered,
            credited,
            price,
            lead_time_days,
            confirmed_at: Utc::now(),
        })
    }

    pub fn supplier_declined() -> Self {
        StockQueryEvent::SupplierDeclined(SupplierDeclinedData {
            declined_at: Utc::now(),
        })
    }

    pub fn query_cancelled(reason: impl Into<String>) -> Self {
        StockQueryEvent::QueryCancelled(QueryCancelledData {
            reason: reason.into(),
            cancelled_at: Utc::now(),
        })
    }

    pub fn query_expired(expired_at: DateTime<Utc>) -> Self {
        StockQueryEvent::QueryExpired(QueryExpiredData { expired_at })
    }

    pub fn response_ignored(status: QueryStatus, available: bool, quantity: u32) -> Self {
        StockQueryEvent::ResponseIgnored(ResponseIgnoredData {
            status,
            available,
            quantity,
            received_at: Utc::now(),
        })
    }
}
