use std::time::Duration;

use crate::error::AppError;

/// Read-only configuration for a single run.
///
/// Retry backoff and the inter-request delay are two independent timing
/// knobs: the former reacts to throttling, the latter is the baseline
/// politeness pause between any two requests issued by the same worker.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of concurrent workers.
    pub worker_count: usize,

    /// Total fetch attempts per claimed unit (first attempt included).
    pub max_retries: u32,

    /// Base delay for exponential retry backoff (doubles per failed attempt).
    pub retry_backoff_base: Duration,

    /// Upper bound on a single backoff sleep.
    pub backoff_cap: Duration,

    /// Minimum pause between consecutive fetch attempts by one worker.
    pub inter_request_delay: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            worker_count: 3,
            max_retries: 5,
            retry_backoff_base: Duration::from_secs(5),
            backoff_cap: Duration::from_secs(300),
            inter_request_delay: Duration::from_secs(1),
        }
    }
}

impl RunConfig {
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_retry_backoff_base(mut self, base: Duration) -> Self {
        self.retry_backoff_base = base;
        self
    }

    pub fn with_backoff_cap(mut self, cap: Duration) -> Self {
        self.backoff_cap = cap;
        self
    }

    pub fn with_inter_request_delay(mut self, delay: Duration) -> Self {
        self.inter_request_delay = delay;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.worker_count == 0 {
            return Err(AppError::ConfigError(
                "worker_count must be at least 1".into(),
            ));
        }
        if self.max_retries == 0 {
            return Err(AppError::ConfigError(
                "max_retries must allow at least one attempt".into(),
            ));
        }
        Ok(())
    }
}
