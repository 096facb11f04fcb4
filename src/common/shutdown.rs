//! One-shot cancellation signal shared between tasks.

use std::future::Future;

use tokio::sync::watch;

/// A latch that flips once from running to terminated.
///
/// Every `wait()` future resolves as soon as `shutdown()` has been called,
/// including futures created after the fact.
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender,
        }
    }

    pub fn shutdown(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_terminated(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        async move {
            let _ = receiver.wait_for(|terminated| *terminated).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Shutdown;

    #[tokio::test]
    async fn test_wait_resolves_after_shutdown() {
        let shutdown = Shutdown::new();
        let wait = shutdown.wait();
        assert!(!shutdown.is_terminated());

        shutdown.shutdown();
        tokio::time::timeout(Duration::from_secs(1), wait).await.unwrap();
        assert!(shutdown.is_terminated());
    }

    #[tokio::test]
    async fn test_late_waiter_resolves_immediately() {
        let shutdown = Shutdown::new();
        shutdown.shutdown();
        tokio::time::timeout(Duration::from_secs(1), shutdown.wait()).await.unwrap();
    }
}
