//! Retry schedule and dead letters for best-effort notifications.

use std::time::Duration;

use ballotbox_common::OutboxConfig;

/// Retry configuration with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first delivery.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&OutboxConfig::default())
    }
}

impl From<&OutboxConfig> for RetryConfig {
    fn from(config: &OutboxConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for the given retry attempt (0-indexed).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt >= self.max_retries {
            return self.max_delay;
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let delay = Duration::try_from_secs_f64(delay_secs).unwrap_or(self.max_delay);

        delay.min(self.max_delay)
    }

    /// Check if another retry is allowed after `attempt` retries.
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// A notification that exhausted its retries.
#[derive(Debug, Clone)]
pub struct DeadLetterEntry<T> {
    /// The undelivered payload.
    pub payload: T,
    /// Number of delivery attempts made, the inline one included.
    pub attempts: u32,
    /// Last error message.
    pub last_error: String,
    /// Timestamp of the last failure.
    pub failed_at: chrono::DateTime<chrono::Utc>,
}

impl<T> DeadLetterEntry<T> {
    /// Create a new dead letter entry stamped with the current time.
    pub fn new(payload: T, attempts: u32, last_error: String) -> Self {
        Self {
            payload,
            attempts,
            last_error,
            failed_at: chrono::Utc::now(),
        }
    }
}
