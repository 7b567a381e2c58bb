//! Worker pool configuration
//!
//! This module provides `PoolConfig` for configuring the worker pool.

use std::thread;
use std::time::Duration;

/// Hard cap on the pool size, regardless of core count.
pub const MAX_WORKERS: usize = 8;

/// Configuration for the worker pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Primary queue the pool consumes from
    pub queue: String,

    /// Destination for messages that exhausted their retries
    pub error_queue: String,

    /// Failures allowed per message before escalation
    pub retry_threshold: u32,

    /// Delivery prefetch hint passed to the subscription
    pub prefetch: usize,

    /// Upper bound on a single blocking receive; also how often an idle
    /// worker re-checks its stop signal
    pub recheck_period: Duration,

    /// Number of concurrent workers, capped at [`MAX_WORKERS`]
    pub worker_count: usize,
}

impl PoolConfig {
    /// Create a new PoolConfig with default tuning
    pub fn new(queue: impl Into<String>, error_queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            error_queue: error_queue.into(),
            retry_threshold: 3,
            prefetch: 10,
            recheck_period: Duration::from_millis(3000),
            worker_count: default_worker_count(),
        }
    }

    /// Set the retry threshold
    pub fn with_retry_threshold(mut self, threshold: u32) -> Self {
        self.retry_threshold = threshold;
        self
    }

    /// Set the delivery prefetch hint
    pub fn with_prefetch(mut self, prefetch: usize) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// Set the recheck period
    pub fn with_recheck_period(mut self, period: Duration) -> Self {
        self.recheck_period = period;
        self
    }

    /// Set the worker count, still capped at [`MAX_WORKERS`]
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.clamp(1, MAX_WORKERS);
        self
    }
}

/// min(available cores, MAX_WORKERS), with a floor of one worker
fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_WORKERS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::new("jobs", "jobs:errors");
        assert_eq!(config.queue, "jobs");
        assert_eq!(config.error_queue, "jobs:errors");
        assert_eq!(config.retry_threshold, 3);
        assert_eq!(config.prefetch, 10);
        assert_eq!(config.recheck_period, Duration::from_millis(3000));
        assert!(config.worker_count >= 1);
        assert!(config.worker_count <= MAX_WORKERS);
    }

    #[test]
    fn test_builder_pattern() {
        let config = PoolConfig::new("jobs", "jobs:errors")
            .with_retry_threshold(5)
            .with_prefetch(25)
            .with_recheck_period(Duration::from_millis(100))
            .with_worker_count(2);

        assert_eq!(config.retry_threshold, 5);
        assert_eq!(config.prefetch, 25);
        assert_eq!(config.recheck_period, Duration::from_millis(100));
        assert_eq!(config.worker_count, 2);
    }

    #[test]
    fn test_worker_count_clamped() {
        assert_eq!(
            PoolConfig::new("q", "e").with_worker_count(0).worker_count,
            1
        );
        assert_eq!(
            PoolConfig::new("q", "e").with_worker_count(64).worker_count,
            MAX_WORKERS
        );
    }
}
