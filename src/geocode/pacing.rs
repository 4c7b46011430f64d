//! Pacing between consecutive provider requests.

use std::future::Future;
use std::time::Duration;

/// Waits between records of a batch
pub trait Pacer {
    fn pause(&self) -> impl Future<Output = ()> + Send;
}

/// Fixed sleep between records
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Pacer for FixedDelay {
    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_fixed_delay_sleeps() {
        let pacer = FixedDelay::new(Duration::from_millis(20));
        let start = Instant::now();
        pacer.pause().await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
