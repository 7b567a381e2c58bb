//! Graceful-shutdown coordination
//!
//! One single-slot control channel per worker, written at most once.
//! Signaling is fire-and-forget: the controller never waits for a worker
//! to drain; each worker finishes its in-flight message, observes the
//! signal between messages, and exits.

use tokio::sync::oneshot;

/// Stop signal read by a worker between messages.
pub type StopSignal = oneshot::Receiver<()>;

/// Owns the control channels for a pool of workers.
///
/// Channels are registered at spawn time, one per worker; no channel is
/// shared, so a stop signal reaches exactly one worker and is never
/// duplicated or lost. `signal_all` consumes the senders, so a
/// controller cannot signal twice.
#[derive(Debug, Default)]
pub struct ShutdownController {
    channels: Vec<oneshot::Sender<()>>,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the control channel for one worker and return its
    /// receiving end.
    pub fn register(&mut self) -> StopSignal {
        let (tx, rx) = oneshot::channel();
        self.channels.push(tx);
        rx
    }

    /// Number of workers currently registered.
    pub fn registered(&self) -> usize {
        self.channels.len()
    }

    /// Send the stop signal to every registered worker and return
    /// immediately. A worker that already exited drops its signal
    /// harmlessly.
    pub fn signal_all(&mut self) {
        for tx in self.channels.drain(..) {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot::error::TryRecvError;

    #[test]
    fn test_signal_reaches_every_worker() {
        let mut controller = ShutdownController::new();
        let mut receivers: Vec<_> = (0..4).map(|_| controller.register()).collect();
        assert_eq!(controller.registered(), 4);

        controller.signal_all();

        for rx in receivers.iter_mut() {
            assert!(matches!(rx.try_recv(), Ok(())));
        }
    }

    #[test]
    fn test_no_signal_before_stop() {
        let mut controller = ShutdownController::new();
        let mut rx = controller.register();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_signal_all_is_idempotent() {
        let mut controller = ShutdownController::new();
        let mut rx = controller.register();

        controller.signal_all();
        controller.signal_all(); // channels already consumed, nothing to do

        assert_eq!(controller.registered(), 0);
        assert!(matches!(rx.try_recv(), Ok(())));
    }

    #[test]
    fn test_exited_worker_drops_signal_harmlessly() {
        let mut controller = ShutdownController::new();
        let rx = controller.register();
        drop(rx);
        controller.signal_all();
    }
}
