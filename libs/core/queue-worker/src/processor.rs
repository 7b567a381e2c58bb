//! The pluggable message-processing strategy.

use crate::error::ProcessError;
use async_trait::async_trait;

/// Trait for message processors.
///
/// The integrating application implements this to consume messages from
/// the queue; the harness supplies delivery, retry, and escalation around
/// it.
///
/// Payloads are opaque bytes; parsing them is the processor's business,
/// never the harness's.
///
/// # Example
///
/// ```rust,ignore
/// use queue_worker::{ProcessError, Processor};
///
/// struct OrderProcessor {
///     orders: Arc<dyn OrderService>,
/// }
///
/// #[async_trait]
/// impl Processor for OrderProcessor {
///     async fn process(&self, payload: &[u8]) -> Result<(), ProcessError> {
///         let order = parse_order(payload).map_err(|e| ProcessError::new(e.to_string()))?;
///         self.orders.place(order).await.map_err(|e| ProcessError::new(e.to_string()))
///     }
///
///     fn name(&self) -> &'static str {
///         "OrderProcessor"
///     }
/// }
/// ```
#[async_trait]
pub trait Processor: Send + Sync {
    /// Process a single message payload.
    ///
    /// Return `Ok(())` to acknowledge the message, `Err` to hand it to the
    /// retry policy. A failed message is redelivered until its attempt
    /// count exceeds the pool's retry threshold, then escalated to the
    /// error queue.
    async fn process(&self, payload: &[u8]) -> Result<(), ProcessError>;

    /// Get the processor name for logging.
    fn name(&self) -> &'static str;
}
