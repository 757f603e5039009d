//! Tunables for the fulfillment saga.

use std::time::Duration;

/// Runtime settings of the saga.
///
/// The HTTP adapter fills this from the environment; library users and tests
/// start from [`SagaConfig::default`].
#[derive(Debug, Clone)]
pub struct SagaConfig {
    /// How long a supplier query stays open before the sweeper expires it.
    pub query_ttl: chrono::Duration,
    /// Period of the background expiry sweep.
    pub sweep_interval: Duration,
    /// Attempts per customer notification before it is recorded as failed.
    pub notify_max_attempts: u32,
    /// Pause between notification attempts.
    pub notify_backoff: Duration,
    /// Lead time assumed when no supplier quoted one.
    pub default_lead_time_days: u32,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            query_ttl: chrono::Duration::hours(24),
            sweep_interval: Duration::from_secs(60),
            notify_max_attempts: 3,
            notify_backoff: Duration::from_millis(200),
            default_lead_time_days: 5,
        }
    }
}

impl SagaConfig {
    pub fn with_query_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.query_ttl = ttl;
        self
    }

    pub fn with_notify_backoff(mut self, backoff: Duration) -> Self {
        self.notify_backoff = backoff;
        self
    }

    pub fn with_notify_max_attempts(mut self, attempts: u32) -> Self {
        self.notify_max_attempts = attempts.max(1);
        self
    }
}
