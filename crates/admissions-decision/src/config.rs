//! Engine tuning.

use std::time::Duration;

/// Bounded exponential backoff, used both for version conflicts and for
/// transient store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each one after.
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(25),
        }
    }
}

/// Configuration of the [`AdmissionDecisionEngine`](crate::application::engine::AdmissionDecisionEngine)
/// and the bulk coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Retry policy for conflicts and transient store failures.
    pub retry: RetryPolicy,
    /// Default deadline for one transition, commit included.
    pub transition_timeout: Duration,
    /// Deadline for handing one event to the sink.
    pub publish_timeout: Duration,
    /// Largest accepted bulk request.
    pub max_bulk_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            transition_timeout: Duration::from_secs(5),
            publish_timeout: Duration::from_secs(2),
            max_bulk_size: 500,
        }
    }
}
