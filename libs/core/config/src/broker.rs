use crate::{env_or_default, ConfigError, FromEnv};

/// Message broker configuration
///
/// Everything is optional in the environment; local-development defaults
/// apply when a variable is unset.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    /// Broker connection URL
    pub url: String,
    /// Primary queue the workers consume from
    pub queue: String,
    /// Destination for messages that exhausted their retries
    pub error_queue: String,
    /// Broker username (empty = unauthenticated)
    pub username: String,
    /// Broker password (empty = unauthenticated)
    pub password: String,
}

impl BrokerConfig {
    pub fn new(url: impl Into<String>, queue: impl Into<String>) -> Self {
        let queue = queue.into();
        let error_queue = format!("{}:errors", queue);
        Self {
            url: url.into(),
            queue,
            error_queue,
            username: String::new(),
            password: String::new(),
        }
    }

    /// Set the error queue name
    pub fn with_error_queue(mut self, error_queue: impl Into<String>) -> Self {
        self.error_queue = error_queue.into();
        self
    }

    /// Set the broker credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}

impl FromEnv for BrokerConfig {
    /// Reads from environment variables with local-development defaults:
    /// - BROKER_URL: defaults to redis://127.0.0.1:6379
    /// - QUEUE_NAME: defaults to "ingest:requests"
    /// - ERROR_QUEUE_NAME: defaults to "ingest:errors"
    /// - BROKER_USERNAME / BROKER_PASSWORD: default to empty
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_or_default("BROKER_URL", "redis://127.0.0.1:6379"),
            queue: env_or_default("QUEUE_NAME", "ingest:requests"),
            error_queue: env_or_default("ERROR_QUEUE_NAME", "ingest:errors"),
            username: env_or_default("BROKER_USERNAME", ""),
            password: env_or_default("BROKER_PASSWORD", ""),
        })
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::new("redis://127.0.0.1:6379", "ingest:requests")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_config_from_env_defaults() {
        temp_env::with_vars(
            [
                ("BROKER_URL", None::<&str>),
                ("QUEUE_NAME", None),
                ("ERROR_QUEUE_NAME", None),
                ("BROKER_USERNAME", None),
                ("BROKER_PASSWORD", None),
            ],
            || {
                let config = BrokerConfig::from_env().unwrap();
                assert_eq!(config.url, "redis://127.0.0.1:6379");
                assert_eq!(config.queue, "ingest:requests");
                assert_eq!(config.error_queue, "ingest:errors");
                assert!(!config.has_credentials());
            },
        );
    }

    #[test]
    fn test_broker_config_from_env_overrides() {
        temp_env::with_vars(
            [
                ("BROKER_URL", Some("redis://broker.internal:6379")),
                ("QUEUE_NAME", Some("orders:requests")),
                ("ERROR_QUEUE_NAME", Some("orders:poison")),
                ("BROKER_USERNAME", Some("worker")),
                ("BROKER_PASSWORD", Some("secret")),
            ],
            || {
                let config = BrokerConfig::from_env().unwrap();
                assert_eq!(config.url, "redis://broker.internal:6379");
                assert_eq!(config.queue, "orders:requests");
                assert_eq!(config.error_queue, "orders:poison");
                assert!(config.has_credentials());
                assert_eq!(config.username, "worker");
                assert_eq!(config.password, "secret");
            },
        );
    }

    #[test]
    fn test_broker_config_builder() {
        let config = BrokerConfig::new("redis://localhost:6379", "jobs")
            .with_error_queue("jobs:dead")
            .with_credentials("svc", "pw");

        assert_eq!(config.queue, "jobs");
        assert_eq!(config.error_queue, "jobs:dead");
        assert_eq!(config.username, "svc");
    }

    #[test]
    fn test_broker_config_derives_error_queue() {
        let config = BrokerConfig::new("redis://localhost:6379", "jobs");
        assert_eq!(config.error_queue, "jobs:errors");
    }
}
