//
// gate.rs
//
// One-shot readiness gate tied to a single background parse
//

use std::sync::Arc;

use tokio::sync::watch;

/// Signals that one specific parse attempt has finished, successfully or not.
///
/// A gate starts closed and is released at most once. Every clone observes the
/// same release. Waiters that arrive after the release return immediately.
/// Gates are never reused: each dispatch creates a fresh one.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    sender: Arc<watch::Sender<bool>>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Open the gate. Returns `true` only for the call that actually released it.
    pub fn release(&self) -> bool {
        self.sender.send_if_modified(|released| {
            if *released {
                false
            } else {
                *released = true;
                true
            }
        })
    }

    pub fn is_released(&self) -> bool {
        *self.sender.borrow()
    }

    /// Wait until the gate is released.
    pub async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this only returns once released.
        let _ = receiver.wait_for(|released| *released).await;
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases a gate when dropped, so a panicking parse still unblocks waiters.
pub(crate) struct ReleaseOnDrop(pub(crate) ReadinessGate);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_release_happens_once() {
        let gate = ReadinessGate::new();
        assert!(!gate.is_released());
        assert!(gate.release());
        assert!(!gate.release());
        assert!(gate.is_released());
    }

    #[tokio::test]
    async fn test_wait_after_release_returns_immediately() {
        let gate = ReadinessGate::new();
        gate.release();
        tokio::time::timeout(Duration::from_millis(50), gate.wait())
            .await
            .expect("late waiter should not block");
    }

    #[tokio::test]
    async fn test_waiters_unblock_on_release() {
        let gate = ReadinessGate::new();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        gate.release();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
    }

    #[test]
    fn test_release_on_drop() {
        let gate = ReadinessGate::new();
        {
            let _guard = ReleaseOnDrop(gate.clone());
        }
        assert!(gate.is_released());
    }
}
