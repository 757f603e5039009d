//! Read model trait for dashboard views.

/// A read model providing query access to denormalized data.
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of entries currently held.
    fn count(&self) -> usize;
}
