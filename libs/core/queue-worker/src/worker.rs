//! The per-worker consume loop
//!
//! Each worker independently pulls from the shared subscription, hands
//! the payload to the processor, and settles the delivery with exactly
//! one terminal action: ack on success, nack within the retry budget,
//! escalate past it. A delivery is never dropped without settlement.
//!
//! Cancellation is cooperative and message-boundary-scoped: the stop
//! signal is checked between messages, never mid-invocation. A processor
//! that hangs forever therefore costs the pool that worker; there is
//! deliberately no timeout around the invocation.

use crate::ledger::RetryLedger;
use crate::metrics::PoolMetrics;
use crate::processor::Processor;
use crate::retry::{self, RetryDecision};
use crate::shutdown::StopSignal;
use crate::transport::{ConnectionPtr, Delivery, SubscriptionPtr};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, error, info, warn};

pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) subscription: SubscriptionPtr,
    pub(crate) connection: ConnectionPtr,
    pub(crate) processor: Arc<dyn Processor>,
    pub(crate) ledger: Arc<RetryLedger>,
    pub(crate) retry_threshold: u32,
    pub(crate) error_queue: String,
    pub(crate) metrics: PoolMetrics,
    pub(crate) stop: StopSignal,
}

impl Worker {
    pub(crate) async fn run(mut self) {
        debug!(worker = self.id, processor = self.processor.name(), "Worker started");

        loop {
            match self.stop.try_recv() {
                Ok(()) => break,
                // Controller gone counts as a stop
                Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Empty) => {}
            }

            let delivery = match self.subscription.receive().await {
                Ok(Some(delivery)) => delivery,
                // Quiet window; loop back to the stop check
                Ok(None) => continue,
                Err(e) => {
                    warn!(worker = self.id, error = %e, "Receive failed, backing off");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            self.metrics.message_received();
            self.handle(delivery).await;
        }

        info!(worker = self.id, "Worker stopped");
    }

    async fn handle(&self, delivery: Delivery) {
        debug!(
            worker = self.id,
            message_id = %delivery.message_id(),
            "Processing message"
        );

        // A panicking processor is a failure like any other; losing the
        // worker would shrink the pool for the rest of its lifetime
        let outcome = AssertUnwindSafe(self.processor.process(delivery.payload()))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {
                self.ledger.clear(delivery.message_id());
                self.metrics.message_processed();

                if let Err(e) = self.subscription.ack(&delivery).await {
                    error!(
                        worker = self.id,
                        message_id = %delivery.message_id(),
                        error = %e,
                        "Failed to ack message"
                    );
                }
            }
            Ok(Err(e)) => {
                warn!(
                    worker = self.id,
                    message_id = %delivery.message_id(),
                    processor = self.processor.name(),
                    error = %e,
                    "Processing failed"
                );
                self.metrics.message_failed();
                self.settle_failure(&delivery).await;
            }
            Err(panic) => {
                error!(
                    worker = self.id,
                    message_id = %delivery.message_id(),
                    processor = self.processor.name(),
                    reason = %panic_reason(panic.as_ref()),
                    "Processor panicked"
                );
                self.metrics.message_failed();
                self.settle_failure(&delivery).await;
            }
        }
    }

    /// Apply the retry policy to a failed delivery.
    async fn settle_failure(&self, delivery: &Delivery) {
        let attempts = self.ledger.record_failure(delivery.message_id());

        match retry::decide(attempts, self.retry_threshold) {
            RetryDecision::Retry => {
                debug!(
                    message_id = %delivery.message_id(),
                    attempts,
                    threshold = self.retry_threshold,
                    "Returning message for redelivery"
                );
                self.metrics.message_retried();

                if let Err(e) = self.subscription.nack(delivery).await {
                    error!(
                        message_id = %delivery.message_id(),
                        error = %e,
                        "Failed to nack message"
                    );
                }
            }
            RetryDecision::Escalate => {
                warn!(
                    message_id = %delivery.message_id(),
                    attempts,
                    error_queue = %self.error_queue,
                    "Retries exhausted, escalating"
                );

                match self
                    .connection
                    .send(&self.error_queue, delivery.payload())
                    .await
                {
                    Ok(()) => {
                        self.metrics.message_escalated();
                        self.ledger.clear(delivery.message_id());

                        if let Err(e) = self.subscription.ack(delivery).await {
                            error!(
                                message_id = %delivery.message_id(),
                                error = %e,
                                "Failed to ack escalated message"
                            );
                        }
                    }
                    Err(e) => {
                        // Keep the message on the broker rather than
                        // dropping it; escalation runs again on the next
                        // redelivery
                        error!(
                            message_id = %delivery.message_id(),
                            error = %e,
                            "Error queue publish failed, returning message"
                        );

                        if let Err(e) = self.subscription.nack(delivery).await {
                            error!(
                                message_id = %delivery.message_id(),
                                error = %e,
                                "Failed to nack message after escalation failure"
                            );
                        }
                    }
                }
            }
        }
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_reason_str() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_reason(payload.as_ref()), "boom");
    }

    #[test]
    fn test_panic_reason_string() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("kaput"));
        assert_eq!(panic_reason(payload.as_ref()), "kaput");
    }

    #[test]
    fn test_panic_reason_other() {
        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_reason(payload.as_ref()), "non-string panic payload");
    }
}
