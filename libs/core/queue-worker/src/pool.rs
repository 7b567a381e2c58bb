//! The worker pool supervisor
//!
//! Owns the connection, the shared subscription, the retry ledger, and
//! the fixed set of worker tasks.

use crate::config::PoolConfig;
use crate::error::WorkerError;
use crate::ledger::RetryLedger;
use crate::metrics::PoolMetrics;
use crate::processor::Processor;
use crate::shutdown::ShutdownController;
use crate::transport::{AckMode, ConnectionPtr, Connector, SubscribeOptions};
use crate::worker::Worker;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Supervisor for a fixed-size pool of concurrent queue workers.
///
/// Lifecycle: construct with a config and a connector, bind a processor
/// with [`set_processor`](Self::set_processor), start with
/// [`run`](Self::run), request termination with [`stop`](Self::stop).
///
/// `run` connects, subscribes once, and spawns `worker_count` workers
/// bound to the same subscription; it returns after spawning. `stop` is
/// fire-and-forget: it signals every worker and returns without waiting
/// for drain. Call [`join`](Self::join) afterwards when the caller needs
/// the drain barrier (each worker settles its in-flight message before
/// exiting).
///
/// # Example
///
/// ```rust,ignore
/// use queue_worker::{PoolConfig, WorkerPool, RedisConnector, BrokerSettings};
///
/// let config = PoolConfig::new("ingest:requests", "ingest:errors");
/// let connector = Arc::new(RedisConnector::new(BrokerSettings::new(url)));
/// let mut pool = WorkerPool::new(config, connector);
/// pool.set_processor(Arc::new(MyProcessor))?;
/// pool.run().await?;
/// // ...
/// pool.stop();
/// pool.join().await;
/// ```
pub struct WorkerPool {
    config: PoolConfig,
    connector: Arc<dyn Connector>,
    processor: Option<Arc<dyn Processor>>,
    ledger: Arc<RetryLedger>,
    shutdown: ShutdownController,
    workers: JoinSet<()>,
    connection: Option<ConnectionPtr>,
    running: bool,
}

impl WorkerPool {
    /// Create a new pool. Nothing connects until [`run`](Self::run).
    pub fn new(config: PoolConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            processor: None,
            ledger: Arc::new(RetryLedger::new()),
            shutdown: ShutdownController::new(),
            workers: JoinSet::new(),
            connection: None,
            running: false,
        }
    }

    /// Bind the message-processing strategy.
    ///
    /// Must be called before [`run`](Self::run); rebinding a running
    /// pool is rejected.
    pub fn set_processor(&mut self, processor: Arc<dyn Processor>) -> Result<(), WorkerError> {
        if self.running {
            return Err(WorkerError::AlreadyRunning);
        }
        self.processor = Some(processor);
        Ok(())
    }

    /// The shared retry ledger, for observability and tests.
    pub fn retry_ledger(&self) -> Arc<RetryLedger> {
        Arc::clone(&self.ledger)
    }

    /// Pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Connect, subscribe, and start the workers.
    ///
    /// Fails fast on connection or subscription errors. The pool does
    /// not retry startup; the caller decides whether to restart the
    /// whole harness. Returns once all workers are spawned.
    pub async fn run(&mut self) -> Result<(), WorkerError> {
        if self.running {
            return Err(WorkerError::AlreadyRunning);
        }
        let processor = self.processor.clone().ok_or(WorkerError::NoProcessor)?;

        info!(
            queue = %self.config.queue,
            error_queue = %self.config.error_queue,
            workers = self.config.worker_count,
            retry_threshold = self.config.retry_threshold,
            processor = processor.name(),
            "Starting worker pool"
        );

        let connection = self.connector.connect().await?;
        let subscription = connection
            .subscribe(
                &self.config.queue,
                SubscribeOptions {
                    ack_mode: AckMode::Client,
                    prefetch: self.config.prefetch,
                    recheck_period: self.config.recheck_period,
                },
            )
            .await?;

        for id in 0..self.config.worker_count {
            let worker = Worker {
                id,
                subscription: Arc::clone(&subscription),
                connection: Arc::clone(&connection),
                processor: Arc::clone(&processor),
                ledger: Arc::clone(&self.ledger),
                retry_threshold: self.config.retry_threshold,
                error_queue: self.config.error_queue.clone(),
                metrics: PoolMetrics::new(&self.config.queue, processor.name()),
                stop: self.shutdown.register(),
            };
            self.workers.spawn(worker.run());
        }

        self.connection = Some(connection);
        self.running = true;
        info!(workers = self.config.worker_count, "Worker pool running");
        Ok(())
    }

    /// Signal every worker to stop and return immediately.
    ///
    /// Does not wait for workers to finish their in-flight messages;
    /// each worker settles its current delivery and exits at the next
    /// message boundary. Use [`join`](Self::join) to wait for that.
    pub fn stop(&mut self) {
        if self.shutdown.registered() == 0 {
            return;
        }
        info!(queue = %self.config.queue, "Stopping worker pool");
        self.shutdown.signal_all();
    }

    /// Wait for every worker to exit, then close the connection.
    pub async fn join(&mut self) {
        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Worker task failed");
            }
        }

        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                error!(error = %e, "Failed to close connection");
            }
        }

        self.running = false;
        info!(queue = %self.config.queue, "Worker pool stopped");
    }
}
