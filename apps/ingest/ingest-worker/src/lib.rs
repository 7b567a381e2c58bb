//! Ingest Worker Service
//!
//! A background worker that consumes ingest requests from the message
//! broker and validates them before they reach downstream consumers.
//!
//! ## Architecture
//!
//! ```text
//! Broker queue (ingest:requests)
//!   ↓ (shared subscription, one worker per core, capped at 8)
//! WorkerPool<IngestProcessor>
//!   ↓ (failures retried up to RETRY_THRESHOLD times)
//! Broker queue (ingest:errors)   ← messages that exhausted retries
//! ```
//!
//! ## Features
//!
//! - Bounded worker pool sized from hardware parallelism
//! - Automatic retry with error-queue escalation for poison messages
//! - Graceful shutdown on SIGINT/SIGTERM, draining in-flight messages
//! - Prometheus metrics and env-aware structured logging

use async_trait::async_trait;
use core_config::{BrokerConfig, Environment, FromEnv, WorkerSettings};
use eyre::{Result, WrapErr};
use queue_worker::{
    metrics, BrokerSettings, PoolConfig, ProcessError, Processor, RedisConnector, WorkerPool,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

/// Validates ingest request payloads.
///
/// Requests must be non-empty UTF-8; anything else fails, gets retried
/// (a transient producer bug may fix itself), and eventually lands on
/// the error queue for inspection.
struct IngestProcessor;

#[async_trait]
impl Processor for IngestProcessor {
    async fn process(&self, payload: &[u8]) -> Result<(), ProcessError> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| ProcessError::new(format!("payload is not UTF-8: {}", e)))?;

        if text.trim().is_empty() {
            return Err(ProcessError::new("empty payload"));
        }

        info!(bytes = payload.len(), "Ingested request");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "IngestProcessor"
    }
}

/// Run the ingest worker
///
/// This is the main entry point for the worker. It:
/// 1. Sets up structured logging (env-aware: JSON for prod, pretty for dev)
/// 2. Loads broker and pool configuration from the environment
/// 3. Starts the worker pool against the broker
/// 4. Waits for a shutdown signal, then stops and drains the pool
///
/// # Errors
///
/// Returns an error if the broker cannot be reached or the subscription
/// cannot be established. Per-message failures never surface here; they
/// end up on the error queue.
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);
    metrics::init_metrics();

    info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        "Starting ingest worker service"
    );
    info!("Environment: {:?}", environment);

    let broker = BrokerConfig::from_env().wrap_err("Failed to load broker configuration")?;
    let settings = WorkerSettings::from_env().wrap_err("Failed to load worker settings")?;
    info!(
        url = %broker.url,
        queue = %broker.queue,
        error_queue = %broker.error_queue,
        workers = settings.worker_count,
        retry_threshold = settings.retry_threshold,
        "Configuration loaded"
    );

    let mut broker_settings = BrokerSettings::new(&broker.url);
    if broker.has_credentials() {
        broker_settings = broker_settings.with_credentials(&broker.username, &broker.password);
    }

    let pool_config = PoolConfig::new(&broker.queue, &broker.error_queue)
        .with_retry_threshold(settings.retry_threshold)
        .with_prefetch(settings.message_threshold)
        .with_recheck_period(Duration::from_millis(settings.recheck_period_ms))
        .with_worker_count(settings.worker_count);

    let connector = Arc::new(RedisConnector::new(broker_settings));
    let mut pool = WorkerPool::new(pool_config, connector);
    pool.set_processor(Arc::new(IngestProcessor))
        .wrap_err("Failed to bind processor")?;
    pool.run().await.wrap_err("Failed to start worker pool")?;

    shutdown_signal().await?;

    info!("Shutting down worker pool");
    pool.stop();
    pool.join().await;

    info!("Ingest worker service stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }

    Ok(())
}
