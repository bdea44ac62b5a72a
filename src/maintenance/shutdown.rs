//! Stop signal shared by all maintenance loops.
//!
//! Loops only ever suspend inside [`ShutdownSignal::wait`], so the signal is
//! observed at every wait boundary and nowhere else. Only an explicit
//! [`ShutdownTrigger::trigger`] stops the loops: the sender lives in a slot
//! shared by the trigger and every signal, so dropping the trigger leaves
//! the loops running.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

type SenderSlot = Arc<Mutex<Option<Sender<()>>>>;

/// Create a connected trigger/signal pair.
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    // nothing is ever sent; disconnecting the sender is the signal
    let (tx, rx) = channel::bounded::<()>(1);
    let slot: SenderSlot = Arc::new(Mutex::new(Some(tx)));
    (
        ShutdownTrigger {
            slot: Arc::clone(&slot),
        },
        ShutdownSignal { rx, _slot: slot },
    )
}

/// Owning side.
#[derive(Debug)]
pub struct ShutdownTrigger {
    slot: SenderSlot,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.slot.lock().take();
    }

    pub fn is_triggered(&self) -> bool {
        self.slot.lock().is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: Receiver<()>,
    _slot: SenderSlot,
}

impl ShutdownSignal {
    /// Sleep for `timeout` unless shutdown is requested first.
    /// Returns `true` when the caller should stop.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_wait_times_out_without_trigger() {
        let (_trigger, signal) = shutdown_channel();
        let started = Instant::now();
        assert!(!signal.wait(Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(!signal.is_triggered());
    }

    #[test]
    fn test_trigger_wakes_waiters() {
        let (trigger, signal) = shutdown_channel();
        let waiter = {
            let signal = signal.clone();
            std::thread::spawn(move || {
                let started = Instant::now();
                let stopped = signal.wait(Duration::from_secs(60));
                (stopped, started.elapsed())
            })
        };

        std::thread::sleep(Duration::from_millis(20));
        trigger.trigger();
        let (stopped, waited) = waiter.join().unwrap();

        assert!(stopped);
        assert!(waited < Duration::from_secs(30));
        assert!(trigger.is_triggered());
        assert!(signal.is_triggered());
        assert!(signal.wait(Duration::from_secs(60)));
    }

    #[test]
    fn test_dropping_trigger_does_not_signal() {
        let (trigger, signal) = shutdown_channel();
        drop(trigger);
        assert!(!signal.is_triggered());
        assert!(!signal.wait(Duration::from_millis(5)));
    }
}
