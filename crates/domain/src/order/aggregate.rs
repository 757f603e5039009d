//! Order aggregate implementation.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use common::{AggregateId, ProductId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    CustomerId, DispatchedQuery, EscalationKind, Money, NotificationState, OrderError, OrderEvent,
    OrderItem, OrderStatus,
    events::{OrderFulfilledData, OrderPlacedData, QueriesDispatchedData},
};

/// All supplier queries for one product of one order.
///
/// `needed` is the shortfall at placement and never changes. How much of it
/// has been covered lives on the queries themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentGroup {
    pub product_id: ProductId,
    pub needed: u32,
    pub queries: Vec<DispatchedQuery>,
    /// Escalations raised since the last dispatch round.
    pub escalations: BTreeSet<EscalationKind>,
}

impl FulfillmentGroup {
    fn new(product_id: ProductId, needed: u32) -> Self {
        Self {
            product_id,
            needed,
            queries: Vec::new(),
            escalations: BTreeSet::new(),
        }
    }

    pub fn query_ids(&self) -> impl Iterator<Item = AggregateId> + '_ {
        self.queries.iter().map(|q| q.query_id)
    }

    pub fn has_escalated(&self, kind: EscalationKind) -> bool {
        self.escalations.contains(&kind)
    }
}

/// Order aggregate root.
#[derive(Debug, Clone, Default)]
pub struct Order {
    id: Option<AggregateId>,
    version: Version,
    customer_id: Option<CustomerId>,
    status: OrderStatus,
    items: Vec<OrderItem>,
    total_amount: Money,
    /// Keyed by product, one per item with a shortfall.
    groups: BTreeMap<ProductId, FulfillmentGroup>,
    notification: NotificationState,
    notification_attempts: u32,
    last_notification_error: Option<String>,
    estimated_delivery: Option<DateTime<Utc>>,
    lead_time_days: Option<u32>,
    placed_at: Option<DateTime<Utc>>,
    fulfilled_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
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
            OrderEvent::OrderPlaced(data) => self.apply_placed(data),
            OrderEvent::ShortfallRecorded(data) => {
                self.groups.insert(
                    data.product_id.clone(),
                    FulfillmentGroup::new(data.product_id, data.needed),
                );
                self.status = OrderStatus::AwaitingStock;
            }
            OrderEvent::QueriesDispatched(data) => self.apply_queries_dispatched(data),
            OrderEvent::SourcingEscalated(data) => {
                if let Some(group) = self.groups.get_mut(&data.product_id) {
                    group.escalations.insert(data.kind);
                }
            }
            OrderEvent::OrderFulfilled(data) => self.apply_fulfilled(data),
            OrderEvent::CustomerNotified(data) => {
                self.notification = NotificationState::Delivered;
                self.notification_attempts += data.attempts;
                self.last_notification_error = None;
            }
            OrderEvent::CustomerNotificationFailed(data) => {
                self.notification = NotificationState::Failed;
                self.notification_attempts += data.attempts;
                self.last_notification_error = Some(data.error);
            }
            OrderEvent::NotificationRetryClaimed(_) => {
                self.notification = NotificationState::Pending;
            }
            OrderEvent::OrderCancelled(data) => {
                self.status = OrderStatus::Cancelled;
                self.cancel_reason = Some(data.reason);
            }
        }
    }
}

// Query methods
impl Order {
    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// True while any item is waiting on supplier stock.
    pub fn awaiting_supplier(&self) -> bool {
        self.status == OrderStatus::AwaitingStock
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn get_item(&self, product_id: &ProductId) -> Option<&OrderItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn groups(&self) -> impl Iterator<Item = &FulfillmentGroup> {
        self.groups.values()
    }

    pub fn group(&self, product_id: &ProductId) -> Option<&FulfillmentGroup> {
        self.groups.get(product_id)
    }

    pub fn notification(&self) -> NotificationState {
        self.notification
    }

    pub fn notification_attempts(&self) -> u32 {
        self.notification_attempts
    }

    pub fn last_notification_error(&self) -> Option<&str> {
        self.last_notification_error.as_deref()
    }

    pub fn estimated_delivery(&self) -> Option<DateTime<Utc>> {
        self.estimated_delivery
    }

    /// Lead time promised when suppliers covered the order.
    pub fn lead_time_days(&self) -> Option<u32> {
        self.lead_time_days
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn fulfilled_at(&self) -> Option<DateTime<Utc>> {
        self.fulfilled_at
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    /// Short human-facing reference, e.g. `ORD-1A2B3C4D`.
    pub fn order_number(&self) -> String {
        match self.id {
            Some(id) => order_number(id),
            None => String::new(),
        }
    }
}

/// Human-facing reference for an order id.
pub fn order_number(order_id: AggregateId) -> String {
    let simple = order_id.as_uuid().simple().to_string();
    format!("ORD-{}", simple[..8].to_uppercase())
}

// Command methods
impl Order {
    /// Places the order. Items must already carry what stock covered; every
    /// item with a shortfall opens a fulfillment group.
    pub fn place(
        &self,
        order_id: AggregateId,
        customer_id: CustomerId,
        items: Vec<OrderItem>,
        estimated_delivery: Option<DateTime<Utc>>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        let mut seen = BTreeSet::new();
        for item in &items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    quantity: item.quantity,
                });
            }
            if item.unit_price.is_negative() {
                return Err(OrderError::InvalidPrice {
                    price: item.unit_price.cents(),
                });
            }
            if item.reserved_from_stock > item.quantity {
                return Err(OrderError::OverReserved {
                    product_id: item.product_id.clone(),
                });
            }
            if !seen.insert(item.product_id.clone()) {
                return Err(OrderError::DuplicateItem {
                    product_id: item.product_id.clone(),
                });
            }
        }

        let shortfalls: Vec<OrderEvent> = items
            .iter()
            .filter(|item| item.shortfall() > 0)
            .map(|item| OrderEvent::shortfall_recorded(item.product_id.clone(), item.shortfall()))
            .collect();

        let mut events = vec![OrderEvent::order_placed(
            order_id,
            customer_id,
            items,
            estimated_delivery,
        )];
        events.extend(shortfalls);
        Ok(events)
    }

    /// Records queries sent for a group. Queries already recorded are skipped.
    pub fn record_dispatch(
        &self,
        product_id: &ProductId,
        queries: Vec<DispatchedQuery>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_awaiting_stock("dispatch queries")?;
        let group = self.require_group(product_id)?;

        let new_queries: Vec<DispatchedQuery> = queries
            .into_iter()
            .filter(|q| !group.queries.iter().any(|known| known.query_id == q.query_id))
            .collect();

        if new_queries.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![OrderEvent::queries_dispatched(
            product_id.clone(),
            new_queries,
        )])
    }

    /// Records an escalation for a group, at most once per kind per
    /// dispatch round. Settled orders are not escalated.
    pub fn escalate(
        &self,
        product_id: &ProductId,
        kind: EscalationKind,
        detail: &str,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let group = self.require_group(product_id)?;

        if self.status != OrderStatus::AwaitingStock || group.has_escalated(kind) {
            return Ok(vec![]);
        }

        Ok(vec![OrderEvent::sourcing_escalated(
            product_id.clone(),
            kind,
            detail,
        )])
    }

    /// Moves AwaitingStock to Fulfilled.
    ///
    /// Asking again once fulfilled yields no events, so of several
    /// concurrent callers only the one whose append lands sees an event.
    pub fn fulfill(
        &self,
        lead_time_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.status == OrderStatus::Fulfilled {
            return Ok(vec![]);
        }
        self.ensure_awaiting_stock("fulfill")?;

        Ok(vec![OrderEvent::order_fulfilled(lead_time_days, now)])
    }

    pub fn record_notified(&self, attempts: u32) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_notification(NotificationState::Pending)?;
        Ok(vec![OrderEvent::customer_notified(attempts)])
    }

    pub fn record_notification_failed(
        &self,
        attempts: u32,
        error: &str,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_notification(NotificationState::Pending)?;
        Ok(vec![OrderEvent::customer_notification_failed(
            attempts, error,
        )])
    }

    /// Takes ownership of resending a failed notification.
    pub fn claim_notification_retry(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_notification(NotificationState::Failed)?;
        Ok(vec![OrderEvent::notification_retry_claimed()])
    }

    pub fn cancel(&self, reason: &str) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.status.can_cancel() {
            return Err(OrderError::InvalidStateTransition {
                current_status: self.status,
                action: "cancel",
            });
        }

        Ok(vec![OrderEvent::order_cancelled(reason)])
    }

    fn ensure_placed(&self) -> Result<(), OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotPlaced);
        }
        Ok(())
    }

    fn ensure_awaiting_stock(&self, action: &'static str) -> Result<(), OrderError> {
        self.ensure_placed()?;
        if !self.status.can_fulfill() {
            return Err(OrderError::InvalidStateTransition {
                current_status: self.status,
                action,
            });
        }
        Ok(())
    }

    fn ensure_notification(&self, expected: NotificationState) -> Result<(), OrderError> {
        self.ensure_placed()?;
        if self.notification != expected {
            return Err(OrderError::UnexpectedNotificationState {
                expected,
                actual: self.notification,
            });
        }
        Ok(())
    }

    fn require_group(&self, product_id: &ProductId) -> Result<&FulfillmentGroup, OrderError> {
        self.ensure_placed()?;
        self.groups
            .get(product_id)
            .ok_or_else(|| OrderError::NoShortfall {
                product_id: product_id.clone(),
            })
    }
}

// Apply event helpers
impl Order {
    fn apply_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.customer_id = Some(data.customer_id);
        self.status = OrderStatus::Pending;
        self.items = data.items;
        self.total_amount = data.total_amount;
        self.estimated_delivery = data.estimated_delivery;
        self.placed_at = Some(data.placed_at);
    }

    fn apply_queries_dispatched(&mut self, data: QueriesDispatchedData) {
        if let Some(group) = self.groups.get_mut(&data.product_id) {
            group.queries.extend(data.queries);
            group.escalations.clear();
        }
    }

    fn apply_fulfilled(&mut self, data: OrderFulfilledData) {
        self.status = OrderStatus::Fulfilled;
        self.estimated_delivery = Some(data.estimated_delivery);
        self.lead_time_days = Some(data.lead_time_days);
        self.fulfilled_at = Some(data.fulfilled_at);
        self.notification = NotificationState::Pending;
    }
}
