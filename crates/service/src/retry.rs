//! Retry policy for read-after-write lag between the Auth Service and the store.

use std::time::Duration;

use configs::{FixedRetryConfig, LinearRetryConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay between every attempt.
    Fixed(Duration),
    /// `initial * (attempt + 1)`, capped at `max`.
    Linear { initial: Duration, max: Duration },
}

/// Bounded attempts plus the delay between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), backoff: Backoff::Fixed(delay) }
    }

    pub fn linear(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), backoff: Backoff::Linear { initial, max: max.max(initial) } }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Delay to wait after the zero-based `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(d) => d,
            Backoff::Linear { initial, max } => initial.saturating_mul(attempt.saturating_add(1)).min(max),
        }
    }

    pub fn is_last(&self, attempt: u32) -> bool {
        attempt + 1 >= self.max_attempts
    }

    pub async fn pause(&self, attempt: u32) {
        tokio::time::sleep(self.delay_for(attempt)).await;
    }

    /// Upper bound of total sleeping across all attempts.
    pub fn worst_case_wait(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1)).map(|a| self.delay_for(a)).sum()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self { Self::fixed(3, Duration::from_millis(500)) }
}

impl From<&FixedRetryConfig> for RetryPolicy {
    fn from(c: &FixedRetryConfig) -> Self { Self::fixed(c.max_attempts, Duration::from_millis(c.delay_ms)) }
}

impl From<&LinearRetryConfig> for RetryPolicy {
    fn from(c: &LinearRetryConfig) -> Self {
        Self::linear(c.max_attempts, Duration::from_millis(c.initial_ms), Duration::from_millis(c.max_ms))
    }
}
