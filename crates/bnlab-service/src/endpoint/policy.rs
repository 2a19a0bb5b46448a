use std::time::Duration;

/// How hard the resolver tries each candidate before moving on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Wait after the failed `attempt` (1-based) before the next try on the same candidate.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt)
    }

    pub fn has_next_attempt(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
