//! Bounded fetch retries with exponential backoff and per-worker pacing.
//!
//! The retry decision is a pure function of the error classification, not
//! control flow around a generic exception type. Rate-limit-class errors
//! (throttling, timeouts, connection failures) back off and retry; terminal
//! errors (not-found, malformed payloads) fail the unit immediately without
//! consuming budget.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::error::AppError;
use crate::traits::Fetcher;
use crate::work::{RawDocument, WorkUnit};

/// What to do with a failed fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Retry,
    Fail,
}

impl RetryAction {
    pub fn for_error(error: &AppError) -> Self {
        if error.is_retryable() {
            RetryAction::Retry
        } else {
            RetryAction::Fail
        }
    }
}

/// Timing knobs for one executor, derived from the run configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per unit, first attempt included.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub inter_request_delay: Duration,
}

impl RetryPolicy {
    pub fn from_run_config(config: &crate::config::RunConfig) -> Self {
        Self {
            max_attempts: config.max_retries,
            backoff_base: config.retry_backoff_base,
            backoff_cap: config.backoff_cap,
            inter_request_delay: config.inter_request_delay,
        }
    }

    /// Backoff slept after failed attempt `attempt` (1-indexed):
    /// `base * 2^(attempt-1)`, capped.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .backoff_base
            .saturating_mul(2u32.saturating_pow(exponent));
        delay.min(self.backoff_cap)
    }
}

/// Wraps a [`Fetcher`] with bounded retries and pacing.
///
/// One executor belongs to one worker: the pacing gate guarantees at least
/// `inter_request_delay` between any two attempts issued through it,
/// independent of retry backoff. Sleeps suspend only the owning worker.
/// This component never touches the checkpoint store.
pub struct FetchExecutor<F: Fetcher> {
    fetcher: F,
    policy: RetryPolicy,
    last_attempt: Mutex<Option<Instant>>,
}

impl<F: Fetcher> FetchExecutor<F> {
    pub fn new(fetcher: F, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            policy,
            last_attempt: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch with retries. Returns the raw document, the first terminal
    /// error, or [`AppError::ExhaustedRetries`] carrying the last observed
    /// retryable error.
    pub async fn fetch_with_retry(&self, unit: &WorkUnit) -> Result<RawDocument, AppError> {
        let mut last_error: Option<AppError> = None;

        for attempt in 1..=self.policy.max_attempts {
            self.pace().await;

            match self.fetcher.fetch(unit).await {
                Ok(document) => return Ok(document),
                Err(error) => match RetryAction::for_error(&error) {
                    RetryAction::Fail => return Err(error),
                    RetryAction::Retry => {
                        tracing::warn!(
                            unit = %unit,
                            attempt,
                            max_attempts = self.policy.max_attempts,
                            error = %error,
                            "Fetch attempt failed"
                        );
                        if attempt < self.policy.max_attempts {
                            let backoff = self.policy.backoff_for_attempt(attempt);
                            tracing::debug!(
                                unit = %unit,
                                backoff_ms = %backoff.as_millis(),
                                "Backing off before retry"
                            );
                            tokio::time::sleep(backoff).await;
                        }
                        last_error = Some(error);
                    }
                },
            }
        }

        Err(AppError::ExhaustedRetries {
            attempts: self.policy.max_attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt was made".to_string()),
        })
    }

    /// Enforce the minimum delay since this executor's previous attempt.
    async fn pace(&self) {
        let mut last = self.last_attempt.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.policy.inter_request_delay {
                tokio::time::sleep(self.policy.inter_request_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockFetcher, make_unit};
    use serde_json::json;

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_base: Duration::from_millis(10),
            backoff_cap: Duration::from_millis(40),
            inter_request_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_retry_action_classification() {
        assert_eq!(
            RetryAction::for_error(&AppError::RateLimited("HTTP 429".into())),
            RetryAction::Retry
        );
        assert_eq!(
            RetryAction::for_error(&AppError::Timeout(20)),
            RetryAction::Retry
        );
        assert_eq!(
            RetryAction::for_error(&AppError::NotFound("a_1".into())),
            RetryAction::Fail
        );
        assert_eq!(
            RetryAction::for_error(&AppError::Malformed("empty".into())),
            RetryAction::Fail
        );
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff_base: Duration::from_secs(5),
            backoff_cap: Duration::from_secs(30),
            inter_request_delay: Duration::ZERO,
        };

        assert_eq!(policy.backoff_for_attempt(1), Duration::from_secs(5));
        assert_eq!(policy.backoff_for_attempt(2), Duration::from_secs(10));
        assert_eq!(policy.backoff_for_attempt(3), Duration::from_secs(20));
        assert_eq!(policy.backoff_for_attempt(4), Duration::from_secs(30));
        assert_eq!(policy.backoff_for_attempt(5), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_is_non_decreasing() {
        let policy = quick_policy(8);
        let mut previous = Duration::ZERO;
        for attempt in 1..=8 {
            let delay = policy.backoff_for_attempt(attempt);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[tokio::test]
    async fn test_success_returns_immediately() {
        let fetcher = MockFetcher::new(json!({"product_id": 1}));
        let executor = FetchExecutor::new(fetcher.clone(), quick_policy(5));

        let document = executor.fetch_with_retry(&make_unit("a.com", "1")).await.unwrap();
        assert_eq!(document, json!({"product_id": 1}));
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_always_rate_limited_uses_exact_attempt_budget() {
        let fetcher = MockFetcher::with_responses(
            (0..10)
                .map(|_| Err(AppError::RateLimited("HTTP 429".into())))
                .collect(),
        );
        let executor = FetchExecutor::new(fetcher.clone(), quick_policy(5));

        let err = executor
            .fetch_with_retry(&make_unit("a.com", "1"))
            .await
            .unwrap_err();

        assert_eq!(fetcher.call_count(), 5);
        match err {
            AppError::ExhaustedRetries {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 5);
                assert!(last_error.contains("429"));
            }
            other => panic!("expected ExhaustedRetries, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_terminal_error_fails_without_retry() {
        let fetcher = MockFetcher::with_error(AppError::NotFound("a.com_1".into()));
        let executor = FetchExecutor::new(fetcher.clone(), quick_policy(5));

        let err = executor
            .fetch_with_retry(&make_unit("a.com", "1"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_single_rate_limit() {
        let fetcher = MockFetcher::with_responses(vec![
            Err(AppError::RateLimited("HTTP 403".into())),
            Ok(json!({"product_id": 2})),
        ]);
        let executor = FetchExecutor::new(fetcher.clone(), quick_policy(5));

        let document = executor.fetch_with_retry(&make_unit("a.com", "2")).await.unwrap();
        assert_eq!(document, json!({"product_id": 2}));
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn test_inter_attempt_delays_are_non_decreasing() {
        let fetcher = MockFetcher::with_responses(
            (0..4)
                .map(|_| Err(AppError::RateLimited("HTTP 429".into())))
                .collect(),
        );
        let executor = FetchExecutor::new(fetcher.clone(), quick_policy(4));

        let _ = executor.fetch_with_retry(&make_unit("a.com", "1")).await;

        let instants = fetcher.call_instants();
        assert_eq!(instants.len(), 4);
        let mut previous_gap = Duration::ZERO;
        for pair in instants.windows(2) {
            let gap = pair[1].duration_since(pair[0]);
            // Allow scheduler slop below the previous gap, never below the
            // backoff floor for that attempt.
            assert!(gap + Duration::from_millis(5) >= previous_gap);
            previous_gap = gap;
        }
    }

    #[tokio::test]
    async fn test_pacing_enforces_minimum_gap() {
        let fetcher = MockFetcher::with_responses(vec![
            Err(AppError::RateLimited("HTTP 429".into())),
            Ok(json!({})),
        ]);
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff_base: Duration::ZERO,
            backoff_cap: Duration::ZERO,
            inter_request_delay: Duration::from_millis(50),
        };
        let executor = FetchExecutor::new(fetcher.clone(), policy);

        executor.fetch_with_retry(&make_unit("a.com", "1")).await.unwrap();

        let instants = fetcher.call_instants();
        assert_eq!(instants.len(), 2);
        assert!(instants[1].duration_since(instants[0]) >= Duration::from_millis(50));
    }
}
