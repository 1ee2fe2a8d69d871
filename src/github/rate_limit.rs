//! Rate-limit budget tracking for GitHub REST responses.
//!
//! Every response carries `x-ratelimit-remaining` and `x-ratelimit-reset`
//! (epoch seconds). The limiter keeps the most pessimistic view of the
//! current window and holds back dispatch once it reaches zero.

use std::time::Duration;

use chrono::{DateTime, Utc};
use http::HeaderMap;
use tokio::sync::Mutex;

use super::error::header_u64;

/// Budget snapshot as reported by one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitState {
    /// Parse the standard rate-limit headers. Returns `None` when either is
    /// missing or malformed.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let remaining = header_u64(headers, "x-ratelimit-remaining")?;
        let reset = header_u64(headers, "x-ratelimit-reset")?;
        let reset_at = DateTime::from_timestamp(i64::try_from(reset).ok()?, 0)?;
        Some(Self {
            remaining: u32::try_from(remaining).unwrap_or(u32::MAX),
            reset_at,
        })
    }

    /// How long dispatch must pause at `now`, if at all.
    pub fn wait_needed(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.remaining > 0 || self.reset_at <= now {
            return None;
        }
        (self.reset_at - now).to_std().ok()
    }
}

/// Why a caller gave up waiting for budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WaitAborted;

/// Shared view of the budget for one batch.
///
/// The check-and-consume step happens under one lock, so no two workers
/// spend the same unit. The reset wait happens outside the lock: every
/// worker that wants to dispatch sees the exhausted budget and waits, while
/// responses already in flight can still report their budget.
#[derive(Debug, Default)]
pub struct RateLimiter {
    state: Mutex<Option<RateLimitState>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<RateLimitState> {
        *self.state.lock().await
    }

    /// Fold a freshly observed snapshot into the shared state.
    ///
    /// A later window replaces the state, the same window keeps the lowest
    /// remaining count, and snapshots from an older window are dropped.
    pub async fn observe(&self, observed: RateLimitState) {
        let mut state = self.state.lock().await;
        *state = Some(match *state {
            None => observed,
            Some(current) if observed.reset_at > current.reset_at => observed,
            Some(current) if observed.reset_at == current.reset_at => RateLimitState {
                remaining: current.remaining.min(observed.remaining),
                reset_at: current.reset_at,
            },
            Some(current) => current,
        });
    }

    /// Wait until the budget allows one more request, then spend one unit.
    ///
    /// `abort` is raced against the reset wait; if it finishes first no unit
    /// is spent.
    pub(crate) async fn acquire<F>(&self, abort: F) -> Result<(), WaitAborted>
    where
        F: Future,
    {
        tokio::pin!(abort);
        loop {
            let (current, wait) = {
                let mut state = self.state.lock().await;
                let now = Utc::now();
                let Some(current) = state.as_mut() else {
                    return Ok(());
                };
                match current.wait_needed(now) {
                    Some(wait) => (*current, wait),
                    None => {
                        if current.reset_at <= now {
                            // The window rolled over; the next response reports the new budget.
                            *state = None;
                        } else {
                            current.remaining = current.remaining.saturating_sub(1);
                        }
                        return Ok(());
                    }
                }
            };

            tracing::info!(
                reset_at = %current.reset_at,
                wait_ms = wait.as_millis(),
                "rate limit exhausted, pausing dispatch"
            );
            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                _ = &mut abort => return Err(WaitAborted),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use http::HeaderValue;

    fn state(remaining: u32, reset_at: DateTime<Utc>) -> RateLimitState {
        RateLimitState { remaining, reset_at }
    }

    #[test]
    fn parses_rate_limit_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("4999"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));
        let parsed = RateLimitState::from_headers(&headers).unwrap();
        assert_eq!(parsed.remaining, 4999);
        assert_eq!(parsed.reset_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn missing_headers_yield_none() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("10"));
        assert!(RateLimitState::from_headers(&headers).is_none());
    }

    #[test]
    fn wait_only_when_exhausted_and_reset_in_future() {
        let now = Utc::now();
        let later = now + TimeDelta::seconds(5);
        assert!(state(1, later).wait_needed(now).is_none());
        assert!(state(0, now - TimeDelta::seconds(1)).wait_needed(now).is_none());
        let wait = state(0, later).wait_needed(now).unwrap();
        assert_eq!(wait, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn same_window_keeps_lowest_remaining() {
        let limiter = RateLimiter::new();
        let reset = Utc::now() + TimeDelta::minutes(10);
        limiter.observe(state(10, reset)).await;
        limiter.observe(state(12, reset)).await;
        assert_eq!(limiter.current().await, Some(state(10, reset)));
    }

    #[tokio::test]
    async fn stale_window_is_ignored_and_new_window_replaces() {
        let limiter = RateLimiter::new();
        let reset = Utc::now() + TimeDelta::minutes(10);
        limiter.observe(state(3, reset)).await;
        limiter.observe(state(0, reset - TimeDelta::minutes(60))).await;
        assert_eq!(limiter.current().await, Some(state(3, reset)));

        let next = reset + TimeDelta::minutes(60);
        limiter.observe(state(5000, next)).await;
        assert_eq!(limiter.current().await, Some(state(5000, next)));
    }

    #[tokio::test]
    async fn acquire_spends_one_unit() {
        let limiter = RateLimiter::new();
        let reset = Utc::now() + TimeDelta::minutes(10);
        limiter.observe(state(2, reset)).await;
        limiter.acquire(std::future::pending::<()>()).await.unwrap();
        assert_eq!(limiter.current().await.map(|s| s.remaining), Some(1));
    }

    #[tokio::test]
    async fn acquire_waits_for_reset() {
        let limiter = RateLimiter::new();
        let reset = Utc::now() + TimeDelta::milliseconds(300);
        limiter.observe(state(0, reset)).await;
        limiter.acquire(std::future::pending::<()>()).await.unwrap();
        assert!(Utc::now() >= reset);
        assert_eq!(limiter.current().await, None);
    }

    #[tokio::test]
    async fn acquire_can_be_aborted() {
        let limiter = RateLimiter::new();
        limiter
            .observe(state(0, Utc::now() + TimeDelta::minutes(10)))
            .await;
        let result = limiter.acquire(std::future::ready(())).await;
        assert_eq!(result, Err(WaitAborted));
        assert_eq!(limiter.current().await.map(|s| s.remaining), Some(0));
    }

    #[tokio::test]
    async fn observe_is_not_blocked_by_a_waiting_dispatch() {
        let limiter = std::sync::Arc::new(RateLimiter::new());
        let reset = Utc::now() + TimeDelta::seconds(2);
        limiter.observe(state(0, reset)).await;

        let waiter = {
            let limiter = std::sync::Arc::clone(&limiter);
            tokio::spawn(async move { limiter.acquire(std::future::pending::<()>()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_millis(200), limiter.observe(state(0, reset)))
            .await
            .expect("observe must not wait for the reset");
        assert!(!waiter.is_finished());
        waiter.abort();
    }
}
