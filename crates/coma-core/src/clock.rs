//! Injectable time source for timestamps and the polling delay

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Time source
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;

    /// Suspend the calling task
    async fn sleep(&self, duration: Duration);
}

/// Wall clock and tokio timers
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
