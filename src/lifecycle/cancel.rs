//! Cancellation coordination for in-flight calls.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{BridgeError, BridgeResult};

/// Caller-owned cancellation signal.
///
/// Clones share the same signal. Any clone may trigger it; every pending
/// [`CancelToken::run`] then resolves to [`BridgeError::Cancelled`].
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Trigger the cancellation signal.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Fail fast if the signal has already fired.
    pub fn check(&self) -> BridgeResult<()> {
        if self.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }
        Ok(())
    }

    /// Resolve once the signal fires.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // sender lives as long as any token clone, so this is unreachable in practice
                std::future::pending::<()>().await;
            }
        }
    }

    /// Drive `fut` unless the signal fires first.
    pub async fn run<F: Future>(&self, fut: F) -> BridgeResult<F::Output> {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(BridgeError::Cancelled),
            out = fut => Ok(out),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
