//! Per-host rate limiting for web crawling

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Spaces requests to the same host at least `1 / requests_per_second` apart
#[derive(Clone)]
pub struct HostRateLimiter {
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl HostRateLimiter {
    /// Create a new rate limiter for the given requests per second
    pub fn new(requests_per_second: f64) -> Self {
        let rps = if requests_per_second.is_finite() && requests_per_second > 0.0 {
            requests_per_second
        } else {
            1.0
        };
        let interval = Duration::from_secs_f64(1.0 / rps).max(Duration::from_micros(1));
        let quota = Quota::with_period(interval)
            .unwrap_or_else(|| Quota::per_second(nonzero!(1u32)))
            .allow_burst(nonzero!(1u32));

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Wait until the next request to `host` is allowed
    pub async fn wait(&self, host: &str) {
        trace!("Rate limiting: waiting for slot on {}", host);
        self.limiter.until_key_ready(&host.to_string()).await;
    }
}
