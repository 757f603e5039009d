//! Read models for the fulfillment dashboard.
//!
//! - [`Projection`] trait for folding events into read models
//! - [`ReadModel`] trait for query access to denormalized data
//! - [`ProjectionProcessor`] for feeding events from the store to projections
//! - Three views: open supplier queries, stock levels, and the order board

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{
    BoardSummary, EscalationEntry, OpenQueriesView, OpenQuery, OrderBoardView, OrderCard,
    StockLevel, StockLevelsView,
};
