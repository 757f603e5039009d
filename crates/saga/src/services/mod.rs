//! External collaborators of the saga and their in-memory implementations.

pub mod customer;
pub mod escalation;
pub mod inventory;
pub mod messaging;
pub mod suppliers;

use std::sync::Arc;

use event_store::EventStore;

pub use customer::{CustomerChannel, InMemoryCustomerChannel};
pub use escalation::{
    Escalation, EscalationSink, InMemoryEscalationLog, LoggingEscalationSink, Severity,
};
pub use inventory::{EventSourcedInventory, InventoryLedger, ProductSnapshot};
pub use messaging::{InMemorySupplierMessenger, SentMessage, SupplierMessenger};
pub use suppliers::{InMemorySupplierDirectory, Supplier, SupplierSelector};

/// Everything the saga talks to outside its own event streams.
#[derive(Clone)]
pub struct Collaborators {
    pub inventory: Arc<dyn InventoryLedger>,
    pub suppliers: Arc<dyn SupplierSelector>,
    pub messenger: Arc<dyn SupplierMessenger>,
    pub customers: Arc<dyn CustomerChannel>,
    pub escalations: Arc<dyn EscalationSink>,
}

/// In-memory collaborators with handles kept for inspection.
#[derive(Clone)]
pub struct InMemoryCollaborators {
    pub inventory: Arc<dyn InventoryLedger>,
    pub suppliers: InMemorySupplierDirectory,
    pub messenger: InMemorySupplierMessenger,
    pub customers: InMemoryCustomerChannel,
    pub escalations: InMemoryEscalationLog,
}

impl InMemoryCollaborators {
    /// Builds the set with an event-sourced ledger on `store`.
    pub fn new<S: EventStore + 'static>(store: S) -> Self {
        Self {
            inventory: Arc::new(EventSourcedInventory::new(store)),
            suppliers: InMemorySupplierDirectory::new(),
            messenger: InMemorySupplierMessenger::new(),
            customers: InMemoryCustomerChannel::new(),
            escalations: InMemoryEscalationLog::new(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            inventory: Arc::clone(&self.inventory),
            suppliers: Arc::new(self.suppliers.clone()),
            messenger: Arc::new(self.messenger.clone()),
            customers: Arc::new(self.customers.clone()),
            escalations: Arc::new(self.escalations.clone()),
        }
    }
}
