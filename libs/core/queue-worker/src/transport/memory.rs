//! In-memory transport
//!
//! Simulates a broker entirely within the process and serves as the
//! reference implementation of the transport semantics: exactly-once
//! delivery among competing receivers, identity-preserving nacks, and
//! bounded blocking receives. Used by tests and local development; no
//! durability, no network behavior.

use super::{
    AckMode, Connection, ConnectionPtr, Connector, Delivery, SubscribeOptions, Subscription,
    SubscriptionPtr,
};
use crate::error::WorkerError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{timeout, Instant};

/// Counter snapshot for one queue, for assertions in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounters {
    /// Messages published to the queue (including nack re-enqueues)
    pub sent: usize,
    /// Deliveries handed to receivers
    pub delivered: usize,
    /// Deliveries settled successfully
    pub acked: usize,
    /// Deliveries returned for redelivery
    pub nacked: usize,
}

#[derive(Default)]
struct Queue {
    messages: Mutex<VecDeque<Delivery>>,
    notify: Notify,
    sent: AtomicUsize,
    delivered: AtomicUsize,
    acked: AtomicUsize,
    nacked: AtomicUsize,
}

impl Queue {
    fn push(&self, delivery: Delivery) {
        self.messages
            .lock()
            .expect("queue lock poisoned")
            .push_back(delivery);
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<Delivery> {
        self.messages
            .lock()
            .expect("queue lock poisoned")
            .pop_front()
    }

    fn depth(&self) -> usize {
        self.messages.lock().expect("queue lock poisoned").len()
    }

    fn counters(&self) -> QueueCounters {
        QueueCounters {
            sent: self.sent.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            nacked: self.nacked.load(Ordering::Relaxed),
        }
    }
}

/// In-process broker shared by connections, subscriptions, and tests.
///
/// Queues are created on first use. Message identities are assigned at
/// publish time and survive nack re-enqueues, which is what lets the
/// retry ledger resume counts across redeliveries.
#[derive(Default)]
pub struct MemoryBroker {
    queues: Mutex<HashMap<String, Arc<Queue>>>,
    next_id: AtomicU64,
}

impl MemoryBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn queue(&self, name: &str) -> Arc<Queue> {
        let mut queues = self.queues.lock().expect("broker lock poisoned");
        queues.entry(name.to_string()).or_default().clone()
    }

    /// Publish a payload onto `queue` with a fresh identity.
    pub fn publish(&self, queue: &str, payload: &[u8]) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let queue = self.queue(queue);
        queue.sent.fetch_add(1, Ordering::Relaxed);
        queue.push(Delivery::new(format!("mem-{}", id), payload.to_vec(), Vec::new()));
    }

    /// Messages currently waiting on `queue`.
    pub fn depth(&self, queue: &str) -> usize {
        self.queue(queue).depth()
    }

    /// Counter snapshot for `queue`.
    pub fn counters(&self, queue: &str) -> QueueCounters {
        self.queue(queue).counters()
    }
}

/// Connector over a shared [`MemoryBroker`].
pub struct MemoryConnector {
    broker: Arc<MemoryBroker>,
}

impl MemoryConnector {
    pub fn new(broker: Arc<MemoryBroker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<ConnectionPtr, WorkerError> {
        Ok(Arc::new(MemoryConnection {
            broker: Arc::clone(&self.broker),
        }))
    }
}

struct MemoryConnection {
    broker: Arc<MemoryBroker>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn subscribe(
        &self,
        queue: &str,
        opts: SubscribeOptions,
    ) -> Result<SubscriptionPtr, WorkerError> {
        Ok(Arc::new(MemorySubscription {
            queue: self.broker.queue(queue),
            ack_mode: opts.ack_mode,
            recheck_period: opts.recheck_period,
        }))
    }

    async fn send(&self, destination: &str, payload: &[u8]) -> Result<(), WorkerError> {
        self.broker.publish(destination, payload);
        Ok(())
    }

    /// The broker may outlive the connection (tests inspect it), so
    /// close releases nothing.
    async fn close(&self) -> Result<(), WorkerError> {
        Ok(())
    }
}

struct MemorySubscription {
    queue: Arc<Queue>,
    ack_mode: AckMode,
    recheck_period: Duration,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn receive(&self) -> Result<Option<Delivery>, WorkerError> {
        let deadline = Instant::now() + self.recheck_period;
        loop {
            if let Some(delivery) = self.queue.pop() {
                self.queue.delivered.fetch_add(1, Ordering::Relaxed);
                if self.ack_mode == AckMode::Auto {
                    self.queue.acked.fetch_add(1, Ordering::Relaxed);
                }
                return Ok(Some(delivery));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            // notify_one stores a permit, so a push between pop and
            // notified() cannot be missed
            let _ = timeout(remaining, self.queue.notify.notified()).await;
        }
    }

    async fn ack(&self, _delivery: &Delivery) -> Result<(), WorkerError> {
        if self.ack_mode == AckMode::Client {
            self.queue.acked.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> Result<(), WorkerError> {
        if self.ack_mode == AckMode::Client {
            self.queue.nacked.fetch_add(1, Ordering::Relaxed);
            // Re-enqueue the same delivery; the identity must survive
            // so the ledger resumes its count
            self.queue.push(delivery.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(recheck_ms: u64) -> SubscribeOptions {
        SubscribeOptions {
            recheck_period: Duration::from_millis(recheck_ms),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_publish_then_receive() {
        let broker = MemoryBroker::new();
        let connection = MemoryConnector::new(broker.clone())
            .connect()
            .await
            .unwrap();
        let subscription = connection.subscribe("q", options(50)).await.unwrap();

        connection.send("q", b"hello").await.unwrap();

        let delivery = subscription.receive().await.unwrap().unwrap();
        assert_eq!(delivery.payload(), b"hello");
        assert_eq!(broker.depth("q"), 0);
    }

    #[tokio::test]
    async fn test_quiet_window_returns_none() {
        let broker = MemoryBroker::new();
        let connection = MemoryConnector::new(broker).connect().await.unwrap();
        let subscription = connection.subscribe("q", options(10)).await.unwrap();

        let start = Instant::now();
        let delivery = subscription.receive().await.unwrap();
        assert!(delivery.is_none());
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_nack_preserves_identity() {
        let broker = MemoryBroker::new();
        let connection = MemoryConnector::new(broker.clone())
            .connect()
            .await
            .unwrap();
        let subscription = connection.subscribe("q", options(50)).await.unwrap();

        connection.send("q", b"payload").await.unwrap();
        let first = subscription.receive().await.unwrap().unwrap();
        subscription.nack(&first).await.unwrap();

        let second = subscription.receive().await.unwrap().unwrap();
        assert_eq!(first.message_id(), second.message_id());

        let counters = broker.counters("q");
        assert_eq!(counters.delivered, 2);
        assert_eq!(counters.nacked, 1);
    }

    #[tokio::test]
    async fn test_auto_ack_settles_on_delivery() {
        let broker = MemoryBroker::new();
        let connection = MemoryConnector::new(broker.clone())
            .connect()
            .await
            .unwrap();
        let opts = SubscribeOptions {
            ack_mode: AckMode::Auto,
            ..options(50)
        };
        let subscription = connection.subscribe("q", opts).await.unwrap();

        connection.send("q", b"payload").await.unwrap();
        let delivery = subscription.receive().await.unwrap().unwrap();
        // explicit settlement is a no-op in auto mode
        subscription.nack(&delivery).await.unwrap();

        let counters = broker.counters("q");
        assert_eq!(counters.acked, 1);
        assert_eq!(counters.nacked, 0);
        assert_eq!(broker.depth("q"), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_competing_receivers_get_disjoint_messages() {
        let broker = MemoryBroker::new();
        let connection = MemoryConnector::new(broker.clone())
            .connect()
            .await
            .unwrap();
        let subscription = connection.subscribe("q", options(20)).await.unwrap();

        for i in 0..100u32 {
            connection.send("q", format!("m{}", i).as_bytes()).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let subscription = subscription.clone();
            handles.push(tokio::spawn(async move {
                let mut ids = Vec::new();
                while let Some(delivery) = subscription.receive().await.unwrap() {
                    ids.push(delivery.message_id().to_string());
                }
                ids
            }));
        }

        let mut all_ids = Vec::new();
        for handle in handles {
            all_ids.extend(handle.await.unwrap());
        }

        all_ids.sort();
        let before_dedup = all_ids.len();
        all_ids.dedup();
        assert_eq!(all_ids.len(), 100, "every message delivered");
        assert_eq!(before_dedup, 100, "no message delivered twice");
    }
}
