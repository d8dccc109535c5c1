//! Injectable time source for retry delays.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

/// Suspends the caller between retry attempts.
#[async_trait]
pub trait Clock: Send + Sync + Debug {
    async fn sleep(&self, duration: Duration);
}

/// Real time, backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
