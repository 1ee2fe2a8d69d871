use std::time::Duration;

use crate::config::types::SubmitDefaults;

/// Tuning knobs for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Create requests allowed in flight at once. Values below 1 act as 1.
    pub max_concurrency: usize,
    /// Extra attempts after the first for transient failures.
    pub max_retries: u32,
    pub retry_backoff_base: Duration,
    pub max_backoff: Duration,
    /// Overall ceiling for the batch; drafts not dispatched by then are skipped.
    pub deadline: Option<Duration>,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_retries: 3,
            retry_backoff_base: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            deadline: None,
        }
    }
}

impl From<&SubmitDefaults> for SubmitOptions {
    fn from(defaults: &SubmitDefaults) -> Self {
        Self {
            max_concurrency: defaults.max_concurrency,
            max_retries: defaults.max_retries,
            retry_backoff_base: Duration::from_millis(defaults.retry_backoff_base_ms),
            max_backoff: Duration::from_secs(defaults.max_backoff_secs),
            deadline: defaults.deadline_secs.map(Duration::from_secs),
        }
    }
}

impl SubmitOptions {
    pub(crate) fn workers(&self) -> usize {
        self.max_concurrency.max(1)
    }

    /// Delay before retry number `retry_index` (0-based): exponential, capped.
    pub fn backoff(&self, retry_index: u32) -> Duration {
        let factor = 2u32.checked_pow(retry_index).unwrap_or(u32::MAX);
        self.retry_backoff_base
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}
