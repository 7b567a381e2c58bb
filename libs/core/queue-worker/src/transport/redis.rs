//! Redis transport
//!
//! Durable queue semantics over Redis lists using the reliable-queue
//! pattern: a receive atomically moves the entry from the primary list to
//! a per-subscription processing list, an ack removes it from the
//! processing list, a nack moves it back for redelivery. An entry
//! therefore always lives in exactly one list and a crash mid-flight
//! leaves it parked in the processing list rather than lost.
//!
//! Payloads travel in a JSON envelope carrying a generated identity, so
//! the same physical message keeps its identity across redeliveries and
//! the retry ledger can resume its count.

use super::{
    BrokerSettings, Connection, ConnectionPtr, Connector, Delivery, SubscribeOptions,
    Subscription, SubscriptionPtr,
};
use crate::error::WorkerError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Wire envelope for one message.
#[derive(Serialize, Deserialize)]
struct WireMessage {
    id: String,
    body: Vec<u8>,
}

/// Connector holding broker settings; `connect` is fail-fast.
pub struct RedisConnector {
    settings: BrokerSettings,
}

impl RedisConnector {
    pub fn new(settings: BrokerSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Connector for RedisConnector {
    async fn connect(&self) -> Result<ConnectionPtr, WorkerError> {
        let url = self.settings.connection_url();
        info!(url = %self.settings.url, "Connecting to broker");

        let client = Client::open(url.as_str()).map_err(|e| WorkerError::connect(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| WorkerError::connect(e.to_string()))?;

        // Verify the connection before handing it to the pool
        let mut conn = manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| WorkerError::connect(e.to_string()))?;

        info!("Connected to broker");
        Ok(Arc::new(RedisConnection { redis: manager }))
    }
}

struct RedisConnection {
    redis: ConnectionManager,
}

#[async_trait]
impl Connection for RedisConnection {
    async fn subscribe(
        &self,
        queue: &str,
        opts: SubscribeOptions,
    ) -> Result<SubscriptionPtr, WorkerError> {
        let consumer_id = format!("worker-{}", Uuid::new_v4());
        let processing = format!("{}:processing:{}", queue, consumer_id);

        // Round-trip once so a bad queue binding fails run() instead of
        // surfacing later inside a worker loop
        let mut conn = self.redis.clone();
        let _: i64 = redis::cmd("LLEN")
            .arg(queue)
            .query_async(&mut conn)
            .await
            .map_err(|e| WorkerError::subscribe(queue, e.to_string()))?;

        info!(queue = %queue, consumer_id = %consumer_id, "Subscribed");
        Ok(Arc::new(RedisSubscription {
            redis: self.redis.clone(),
            queue: queue.to_string(),
            processing,
            recheck_period: opts.recheck_period,
        }))
    }

    async fn send(&self, destination: &str, payload: &[u8]) -> Result<(), WorkerError> {
        let envelope = WireMessage {
            id: Uuid::new_v4().to_string(),
            body: payload.to_vec(),
        };
        let entry = serde_json::to_vec(&envelope)?;

        let mut conn = self.redis.clone();
        redis::cmd("LPUSH")
            .arg(destination)
            .arg(&entry)
            .query_async::<()>(&mut conn)
            .await
            .map_err(WorkerError::Broker)?;

        Ok(())
    }

    /// The multiplexed connection closes when the last clone drops;
    /// there is nothing to release eagerly.
    async fn close(&self) -> Result<(), WorkerError> {
        Ok(())
    }
}

struct RedisSubscription {
    redis: ConnectionManager,
    queue: String,
    processing: String,
    recheck_period: Duration,
}

#[async_trait]
impl Subscription for RedisSubscription {
    async fn receive(&self) -> Result<Option<Delivery>, WorkerError> {
        // BLMOVE's timeout is in seconds; sub-second windows round up to
        // the smallest block Redis accepts
        let timeout_secs = (self.recheck_period.as_millis() as f64 / 1000.0).max(0.1);

        let mut conn = self.redis.clone();
        let raw: Option<Vec<u8>> = redis::cmd("BLMOVE")
            .arg(&self.queue)
            .arg(&self.processing)
            .arg("RIGHT")
            .arg("LEFT")
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await
            .map_err(WorkerError::Broker)?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let delivery = match serde_json::from_slice::<WireMessage>(&raw) {
            Ok(envelope) => Delivery::new(envelope.id, envelope.body, raw),
            Err(_) => {
                // Foreign producer without our envelope; the entry bytes
                // themselves are the only stable identity available
                debug!(queue = %self.queue, "Entry without envelope, using raw identity");
                let id = String::from_utf8_lossy(&raw).into_owned();
                Delivery::new(id, raw.clone(), raw)
            }
        };

        Ok(Some(delivery))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), WorkerError> {
        let mut conn = self.redis.clone();
        redis::cmd("LREM")
            .arg(&self.processing)
            .arg(1)
            .arg(delivery.receipt())
            .query_async::<()>(&mut conn)
            .await
            .map_err(WorkerError::Broker)?;

        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> Result<(), WorkerError> {
        // Move back in one transaction so the entry is never in both
        // lists or neither
        let mut conn = self.redis.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("LREM")
            .arg(&self.processing)
            .arg(1)
            .arg(delivery.receipt())
            .ignore()
            .cmd("LPUSH")
            .arg(&self.queue)
            .arg(delivery.receipt())
            .ignore();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(WorkerError::Broker)?;

        Ok(())
    }
}
