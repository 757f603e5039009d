//! Supplier-sourced order fulfillment.
//!
//! When an order asks for more stock than is on hand, the saga reserves what
//! exists and asks every eligible supplier for the rest. Supplier answers
//! arrive in any order, possibly twice, possibly late. Each one is reconciled
//! against its fulfillment group (all queries for one order and product):
//!
//! 1. Reserve stock and find the shortfall ([`shortage`])
//! 2. Ask eligible suppliers ([`dispatcher`])
//! 3. Credit confirmed units and shrink or cancel sibling queries ([`reconciler`])
//! 4. Move the order to Fulfilled once every group is covered ([`settlement`])
//! 5. Tell the customer exactly once ([`notifier`])
//!
//! Every state change is an append with an expected version, so concurrent
//! writers never lose an update and each terminal transition has one winner.

pub mod config;
mod context;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod expiry;
mod locks;
pub mod messages;
pub mod notifier;
pub mod reconciler;
pub mod services;
pub mod settlement;
pub mod shortage;
pub mod status;

pub use config::SagaConfig;
pub use coordinator::{FulfillmentCoordinator, PlaceOrderRequest};
pub use dispatcher::{DispatchOutcome, QueryDispatcher};
pub use error::SagaError;
pub use expiry::{ExpirySweeper, SweepReport};
pub use notifier::NotificationRelay;
pub use reconciler::{ResponseOutcome, ResponseReconciler, ResponseSubmission};
pub use services::{
    Collaborators, CustomerChannel, Escalation, EscalationSink, EventSourcedInventory,
    InMemoryCollaborators, InMemoryCustomerChannel, InMemoryEscalationLog,
    InMemorySupplierDirectory, InMemorySupplierMessenger, InventoryLedger, LoggingEscalationSink,
    ProductSnapshot, Severity, Supplier, SupplierMessenger, SupplierSelector,
};
pub use settlement::SettlementEngine;
pub use shortage::{Assessment, OrderLine, ShortageDetector};
pub use status::{OrderStatusView, ProductBreakdown, QueryCounts, QueryView};
