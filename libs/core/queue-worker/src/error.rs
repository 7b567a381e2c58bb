//! Harness error types
//!
//! `WorkerError` covers the pool and transport boundary; `ProcessError` is
//! the opaque failure a processor returns for a single message. Any
//! `ProcessError` routes through the retry policy; there is no error
//! taxonomy below "this message failed".

use thiserror::Error;

/// Worker pool and transport errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Broker unreachable at startup; fatal to `run()`
    #[error("Failed to connect to broker: {0}")]
    Connect(String),

    /// Subscription could not be established; fatal to `run()`
    #[error("Failed to subscribe to queue '{queue}': {details}")]
    Subscribe { queue: String, details: String },

    /// Redis connection or command error
    #[error("Broker error: {0}")]
    Broker(#[from] redis::RedisError),

    /// Transport-level failure outside the broker client itself
    #[error("Transport error: {0}")]
    Transport(String),

    /// Envelope encode/decode error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid harness configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// `run()` was called with no processor bound
    #[error("No processor bound; call set_processor() before run()")]
    NoProcessor,

    /// The pool was reconfigured or started while already running
    #[error("Worker pool is already running")]
    AlreadyRunning,
}

impl WorkerError {
    /// Create a connect error
    pub fn connect(details: impl Into<String>) -> Self {
        WorkerError::Connect(details.into())
    }

    /// Create a subscribe error
    pub fn subscribe(queue: impl Into<String>, details: impl Into<String>) -> Self {
        WorkerError::Subscribe {
            queue: queue.into(),
            details: details.into(),
        }
    }

    /// Create a transport error
    pub fn transport(details: impl Into<String>) -> Self {
        WorkerError::Transport(details.into())
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        WorkerError::Serialization(err.to_string())
    }
}

/// Failure returned by a [`crate::Processor`] for one message.
///
/// Deliberately opaque: the harness only needs to know that the message
/// failed, not why. The description is carried into logs and onto the
/// error queue consumer's plate.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ProcessError {
    message: String,
}

impl ProcessError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
