//! Queue Worker Framework
//!
//! A generic message-queue worker pool: attach a processor to a durable
//! queue subscription and fan deliveries out across a bounded set of
//! concurrent workers.
//!
//! ## Features
//!
//! - **Pluggable processor**: one `Processor` trait, supplied by the
//!   integrating application
//! - **Bounded pool**: one worker per core, capped at 8
//! - **Bounded retry**: per-message attempt counting with escalation to
//!   an error queue once the threshold is exceeded
//! - **No silent drops**: every delivery ends in exactly one terminal
//!   action, either an ack after success or an escalation-ack after
//!   exhausted retries
//! - **Graceful shutdown**: per-worker stop signals observed between
//!   messages; in-flight work settles before exit
//! - **Prometheus metrics**: built-in throughput and retry counters
//!
//! ## Example
//!
//! ```ignore
//! use queue_worker::{BrokerSettings, PoolConfig, Processor, RedisConnector, WorkerPool};
//!
//! struct MyProcessor;
//!
//! #[async_trait]
//! impl Processor for MyProcessor {
//!     async fn process(&self, payload: &[u8]) -> Result<(), ProcessError> { /* ... */ }
//!     fn name(&self) -> &'static str { "MyProcessor" }
//! }
//!
//! let config = PoolConfig::new("ingest:requests", "ingest:errors");
//! let connector = Arc::new(RedisConnector::new(BrokerSettings::new(url)));
//! let mut pool = WorkerPool::new(config, connector);
//! pool.set_processor(Arc::new(MyProcessor))?;
//! pool.run().await?;
//! // ...
//! pool.stop();
//! pool.join().await;
//! ```

mod config;
mod error;
mod ledger;
pub mod metrics;
mod pool;
mod processor;
pub mod retry;
mod shutdown;
pub mod transport;
mod worker;

// Re-export main types
pub use config::{PoolConfig, MAX_WORKERS};
pub use error::{ProcessError, WorkerError};
pub use ledger::RetryLedger;
pub use metrics::{init_metrics, PoolMetrics};
pub use pool::WorkerPool;
pub use processor::Processor;
pub use retry::RetryDecision;
pub use shutdown::{ShutdownController, StopSignal};
pub use transport::{
    AckMode, BrokerSettings, Connection, ConnectionPtr, Connector, Delivery, MemoryBroker,
    MemoryConnector, QueueCounters, RedisConnector, SubscribeOptions, Subscription,
    SubscriptionPtr,
};
