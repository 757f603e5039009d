//! Projection processor for feeding events to projections.

use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::error::{ProjectionError, Result};
use crate::projection::Projection;

/// Feeds events from an event store to registered projections.
///
/// Catch-up is incremental: it streams only events after the position of
/// the furthest-behind projection, so calling it before every read is cheap.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    /// Serialises catch-up runs so no event is delivered twice.
    catch_up: Mutex<()>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            catch_up: Mutex::new(()),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Delivers every event the projections have not seen yet. Returns the
    /// number of events streamed.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let _running = self.catch_up.lock().await;

        let mut from = u64::MAX;
        for projection in &self.projections {
            from = from.min(projection.position().await.last_position);
        }
        if from == u64::MAX {
            return Ok(0);
        }

        let mut stream = self.store.stream_events_after(from).await?;
        let mut streamed = 0;
        while let Some(result) = stream.next().await {
            let event = result?;
            streamed += 1;

            for projection in &self.projections {
                if projection.position().await.is_behind(event.position) {
                    projection.handle(&event).await?;
                    metrics::counter!("projections_events_processed").increment(1);
                }
            }
        }

        if streamed > 0 {
            tracing::debug!(from, events = streamed, "catch-up complete");
        }
        Ok(streamed)
    }

    /// Delivers a single event to all registered projections.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<()> {
        if event.position == 0 {
            return Err(ProjectionError::Unpositioned {
                event_type: event.event_type.clone(),
            });
        }
        for projection in &self.projections {
            if projection.position().await.is_behind(event.position) {
                projection.handle(event).await?;
            }
        }
        Ok(())
    }

    /// Resets all projections and replays the whole store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            tracing::info!(projection = projection.name(), "resetting projection");
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}
