use std::time::Duration;

use tracing::debug;

/// Delay between consecutive shops in a detail batch.
pub const DETAIL_SEARCH_INTERVAL: Duration = Duration::from_millis(500);

/// Fixed-interval pacing for sequential upstream calls.
///
/// Pacing relies on the caller running items one after another; it holds no state
/// across batches.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    interval: Duration,
}

impl RateLimiter {
    pub fn fixed(interval: Duration) -> Self {
        Self { interval }
    }

    /// Wait before item `index` (0-based) of a batch. The first item never waits.
    pub async fn before_item(&self, index: usize) {
        if index == 0 || self.interval.is_zero() {
            return;
        }
        debug!(wait_ms = self.interval.as_millis(), "rate limit pause before next item");
        tokio::time::sleep(self.interval).await;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::fixed(DETAIL_SEARCH_INTERVAL)
    }
}
