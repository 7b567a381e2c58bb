use crate::{env_parse_or_default, ConfigError, FromEnv};
use std::thread;

/// Hard cap on the worker pool size, regardless of core count.
pub const MAX_WORKERS: usize = 8;

/// Worker pool tuning loaded from the environment.
///
/// Every numeric field falls back to its default when the variable is
/// absent or unparsable; a bad override must never fail startup.
#[derive(Clone, Debug)]
pub struct WorkerSettings {
    /// Failures allowed per message before it is escalated
    pub retry_threshold: u32,
    /// Delivery prefetch hint for the subscription
    pub message_threshold: usize,
    /// How long a worker waits on the queue before re-checking its stop
    /// signal, in milliseconds
    pub recheck_period_ms: u64,
    /// Number of concurrent workers, min(available cores, MAX_WORKERS)
    pub worker_count: usize,
}

impl WorkerSettings {
    pub fn new() -> Self {
        Self {
            retry_threshold: 3,
            message_threshold: 10,
            recheck_period_ms: 3000,
            worker_count: default_worker_count(),
        }
    }

    /// Set the retry threshold
    pub fn with_retry_threshold(mut self, threshold: u32) -> Self {
        self.retry_threshold = threshold;
        self
    }

    /// Set the message-count threshold
    pub fn with_message_threshold(mut self, threshold: usize) -> Self {
        self.message_threshold = threshold;
        self
    }

    /// Set the recheck period
    pub fn with_recheck_period_ms(mut self, period_ms: u64) -> Self {
        self.recheck_period_ms = period_ms;
        self
    }

    /// Set the worker count, still capped at MAX_WORKERS
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.clamp(1, MAX_WORKERS);
        self
    }
}

impl FromEnv for WorkerSettings {
    /// Reads from environment variables, silently defaulting:
    /// - RETRY_THRESHOLD: defaults to 3
    /// - MESSAGE_THRESHOLD: defaults to 10
    /// - RECHECK_PERIOD_MS: defaults to 3000
    ///
    /// The worker count is derived from hardware parallelism, not the
    /// environment, and capped at [`MAX_WORKERS`].
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            retry_threshold: env_parse_or_default("RETRY_THRESHOLD", 3),
            message_threshold: env_parse_or_default("MESSAGE_THRESHOLD", 10),
            recheck_period_ms: env_parse_or_default("RECHECK_PERIOD_MS", 3000),
            worker_count: default_worker_count(),
        })
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::new()
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
    fn test_worker_settings_defaults() {
        temp_env::with_vars(
            [
                ("RETRY_THRESHOLD", None::<&str>),
                ("MESSAGE_THRESHOLD", None),
                ("RECHECK_PERIOD_MS", None),
            ],
            || {
                let settings = WorkerSettings::from_env().unwrap();
                assert_eq!(settings.retry_threshold, 3);
                assert_eq!(settings.message_threshold, 10);
                assert_eq!(settings.recheck_period_ms, 3000);
            },
        );
    }

    #[test]
    fn test_worker_settings_overrides() {
        temp_env::with_vars(
            [
                ("RETRY_THRESHOLD", Some("5")),
                ("MESSAGE_THRESHOLD", Some("25")),
                ("RECHECK_PERIOD_MS", Some("500")),
            ],
            || {
                let settings = WorkerSettings::from_env().unwrap();
                assert_eq!(settings.retry_threshold, 5);
                assert_eq!(settings.message_threshold, 25);
                assert_eq!(settings.recheck_period_ms, 500);
            },
        );
    }

    #[test]
    fn test_worker_settings_unparsable_falls_back() {
        temp_env::with_vars(
            [
                ("RETRY_THRESHOLD", Some("many")),
                ("MESSAGE_THRESHOLD", Some("-1")),
                ("RECHECK_PERIOD_MS", Some("3.5s")),
            ],
            || {
                let settings = WorkerSettings::from_env().unwrap();
                assert_eq!(settings.retry_threshold, 3);
                assert_eq!(settings.message_threshold, 10);
                assert_eq!(settings.recheck_period_ms, 3000);
            },
        );
    }

    #[test]
    fn test_worker_count_is_capped() {
        let settings = WorkerSettings::new();
        assert!(settings.worker_count >= 1);
        assert!(settings.worker_count <= MAX_WORKERS);
    }

    #[test]
    fn test_with_worker_count_clamps() {
        assert_eq!(WorkerSettings::new().with_worker_count(0).worker_count, 1);
        assert_eq!(
            WorkerSettings::new().with_worker_count(64).worker_count,
            MAX_WORKERS
        );
        assert_eq!(WorkerSettings::new().with_worker_count(4).worker_count, 4);
    }
}
