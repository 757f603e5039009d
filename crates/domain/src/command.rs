//! Command handling infrastructure.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Upper bound on reload-and-retry rounds after losing a version race.
pub const MAX_CONFLICT_RETRIES: usize = 64;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted. Empty when the command
    /// decided there was nothing to do.
    pub events: Vec<A::Event>,

    pub new_version: Version,
}

/// A command addressed to a single aggregate instance.
pub trait Command: Send + Sync {
    type Aggregate: Aggregate;

    fn aggregate_id(&self) -> AggregateId;
}

/// Loads aggregates, runs commands against them and persists the result.
///
/// Every append carries the version the command observed, so two commands
/// decided against the same state cannot both be stored.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replays an aggregate. Unknown ids yield a default instance.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let events = self.store.get_events_for_aggregate(aggregate_id).await?;

        let mut aggregate = A::default();
        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Executes a command once and persists the resulting events.
    ///
    /// A concurrent writer that got there first surfaces as a conflict
    /// ([`DomainError::is_conflict`]); nothing is appended in that case.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        let current_version = aggregate.version();

        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                new_version: current_version,
            });
        }

        let envelopes = self.build_envelopes(aggregate_id, current_version, &events)?;

        let options = if current_version == Version::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(current_version)
        };

        let new_version = self.store.append(envelopes, options).await?;

        for event in &events {
            aggregate.apply(event.clone());
        }
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    /// Executes a command as a compare-and-set loop.
    ///
    /// On a version conflict the aggregate is reloaded and the command decided
    /// again against the fresh state, so the command sees every write that
    /// beat it. Gives up after [`MAX_CONFLICT_RETRIES`] rounds.
    pub async fn execute_with_retry<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        self.retry_on_conflict(aggregate_id, command_fn, Some(MAX_CONFLICT_RETRIES))
            .await
    }

    /// Like [`execute_with_retry`](Self::execute_with_retry) but never gives
    /// up on a conflict.
    ///
    /// Only for commands whose effect commutes with every other command on
    /// the aggregate (stock credits and capped reservations). Each lost round
    /// means another writer committed, so the loop always makes progress.
    pub async fn execute_until_applied<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        self.retry_on_conflict(aggregate_id, command_fn, None).await
    }

    async fn retry_on_conflict<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
        max_retries: Option<usize>,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut attempt = 0;
        loop {
            match self.execute(aggregate_id, &command_fn).await {
                Err(e) if e.is_conflict() && max_retries.is_none_or(|max| attempt < max) => {
                    attempt += 1;
                    tracing::debug!(
                        %aggregate_id,
                        aggregate_type = A::aggregate_type(),
                        attempt,
                        "version conflict, retrying command"
                    );
                    metrics::counter!(
                        "command_conflict_retries_total",
                        "aggregate_type" => A::aggregate_type()
                    )
                    .increment(1);
                    tokio::task::yield_now().await;
                }
                other => return other,
            }
        }
    }

    fn build_envelopes(
        &self,
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .build()?;
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }
}
