//! Errors raised while feeding the dashboard read models.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// A payload did not match the event type its aggregate declares.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The envelope was never committed, so it has no global position to
    /// resume from.
    #[error("Event {event_type} has no store position")]
    Unpositioned { event_type: String },
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
