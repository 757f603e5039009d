//! Shared application state.

use std::sync::Arc;

use event_store::EventStore;
use projections::{OpenQueriesView, OrderBoardView, ProjectionProcessor, StockLevelsView};
use saga::{FulfillmentCoordinator, InMemoryCollaborators, LoggingEscalationSink, SagaConfig};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub coordinator: Arc<FulfillmentCoordinator<S>>,
    /// In-memory collaborators; `POST /suppliers` writes to their directory.
    pub collaborators: InMemoryCollaborators,
    pub processor: ProjectionProcessor<S>,
    pub open_queries: OpenQueriesView,
    pub stock_levels: StockLevelsView,
    pub board: OrderBoardView,
}

impl<S: EventStore + Clone + 'static> AppState<S> {
    /// Wires the saga over `store` with in-memory collaborators, logging
    /// escalations, and registers the dashboard views.
    pub fn new(store: S, config: SagaConfig) -> Self {
        let collaborators = InMemoryCollaborators::new(store.clone());
        let mut wired = collaborators.collaborators();
        wired.escalations = Arc::new(LoggingEscalationSink);

        let coordinator = Arc::new(FulfillmentCoordinator::new(store.clone(), wired, config));

        let open_queries = OpenQueriesView::new();
        let stock_levels = StockLevelsView::new();
        let board = OrderBoardView::new();
        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(open_queries.clone()));
        processor.register(Box::new(stock_levels.clone()));
        processor.register(Box::new(board.clone()));

        Self {
            coordinator,
            collaborators,
            processor,
            open_queries,
            stock_levels,
            board,
        }
    }

    /// Brings the dashboard views up to date before a read.
    pub async fn catch_up(&self) -> Result<(), ApiError> {
        self.processor.run_catch_up().await?;
        Ok(())
    }
}
