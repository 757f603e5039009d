//! Core projection trait and position tracking.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// Store position of the last event a projection has applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProjectionPosition {
    pub last_position: u64,
}

impl ProjectionPosition {
    /// Before the first event.
    pub fn zero() -> Self {
        Self { last_position: 0 }
    }

    /// Position after applying the event at `position`. Never moves back.
    pub fn advance_to(&self, position: u64) -> Self {
        Self {
            last_position: self.last_position.max(position),
        }
    }

    /// True if the event at `position` has not been applied yet.
    pub fn is_behind(&self, position: u64) -> bool {
        self.last_position < position
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.last_position)
    }
}

/// A projection that folds events into a read model.
///
/// `handle` sees every event in the store, whatever its aggregate type, and
/// must advance its position even for events it ignores.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Clears the read model back to its initial state.
    async fn reset(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_starts_at_zero() {
        assert_eq!(ProjectionPosition::zero().last_position, 0);
    }

    #[test]
    fn position_never_moves_back() {
        let pos = ProjectionPosition::zero().advance_to(5);
        assert_eq!(pos.advance_to(3).last_position, 5);
        assert!(pos.is_behind(6));
        assert!(!pos.is_behind(5));
    }

    #[test]
    fn position_display() {
        let pos = ProjectionPosition { last_position: 42 };
        assert_eq!(pos.to_string(), "position(42)");
    }
}
