//! Append-only event store.
//!
//! Appends carry an expected version; a stale expectation is rejected with
//! [`EventStoreError::ConcurrencyConflict`]. Every aggregate in the fulfillment
//! saga relies on that rejection as its compare-and-set primitive.

pub mod error;
pub mod event;
pub mod memory;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use store::{AppendOptions, EventStore, EventStream};
