//! Sliding-window rate limiting
//!
//! Each limiter keeps the timestamps of recent hits per key and refuses a
//! new hit once `limit` of them fall inside the window.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

pub struct SlidingWindowLimiter {
    limit: usize,
    window: Duration,
    hits: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl SlidingWindowLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: RwLock::new(HashMap::new()),
        }
    }

    /// `Err(retry_after_seconds)` when `key` is over the limit
    pub async fn check(&self, key: &str) -> Result<(), i64> {
        self.check_at(key, Utc::now()).await
    }

    async fn check_at(&self, key: &str, now: DateTime<Utc>) -> Result<(), i64> {
        let mut hits = self.hits.write().await;
        let Some(times) = hits.get_mut(key) else {
            return Ok(());
        };
        let cutoff = now - self.window;
        times.retain(|t| *t > cutoff);

        if times.len() < self.limit {
            return Ok(());
        }
        let oldest = times.iter().min().copied().unwrap_or(now);
        Err((oldest + self.window - now).num_seconds().max(1))
    }

    pub async fn record(&self, key: &str) {
        self.record_at(key, Utc::now()).await
    }

    async fn record_at(&self, key: &str, now: DateTime<Utc>) {
        let mut hits = self.hits.write().await;
        hits.entry(key.to_string()).or_default().push(now);
    }

    /// Forget a key, e.g. after a successful sign-in
    pub async fn clear(&self, key: &str) {
        self.hits.write().await.remove(key);
    }

    /// Drop timestamps that left the window; called periodically
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.window;
        let mut hits = self.hits.write().await;
        hits.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.hits.read().await.len()
    }
}

/// The limiters guarding public write endpoints
pub struct RateLimiters {
    /// Failed sign-ins per email: 5 per 15 minutes
    pub sign_in_email: SlidingWindowLimiter,
    /// Sign-in attempts per client IP: 10 per minute
    pub sign_in_ip: SlidingWindowLimiter,
    /// Contact-form submissions per client IP: 5 per 10 minutes
    pub contact_ip: SlidingWindowLimiter,
}

impl RateLimiters {
    pub fn new() -> Self {
        Self {
            sign_in_email: SlidingWindowLimiter::new(5, Duration::minutes(15)),
            sign_in_ip: SlidingWindowLimiter::new(10, Duration::minutes(1)),
            contact_ip: SlidingWindowLimiter::new(5, Duration::minutes(10)),
        }
    }

    pub async fn cleanup(&self) {
        self.sign_in_email.cleanup().await;
        self.sign_in_ip.cleanup().await;
        self.contact_ip.cleanup().await;
    }
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limit_reached_after_n_hits() {
        let limiter = SlidingWindowLimiter::new(3, Duration::minutes(1));
        for _ in 0..3 {
            assert!(limiter.check("10.0.0.1").await.is_ok());
            limiter.record("10.0.0.1").await;
        }
        let retry_after = limiter.check("10.0.0.1").await.unwrap_err();
        assert!((1..=60).contains(&retry_after));

        // other keys are independent
        assert!(limiter.check("10.0.0.2").await.is_ok());
    }

    #[tokio::test]
    async fn test_old_hits_leave_the_window() {
        let limiter = SlidingWindowLimiter::new(2, Duration::minutes(1));
        let past = Utc::now() - Duration::minutes(5);
        limiter.record_at("k", past).await;
        limiter.record_at("k", past).await;

        assert!(limiter.check_at("k", past + Duration::seconds(1)).await.is_err());
        assert!(limiter.check_at("k", Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn test_clear_and_cleanup() {
        let limiter = SlidingWindowLimiter::new(1, Duration::minutes(1));
        limiter.record("a").await;
        assert!(limiter.check("a").await.is_err());
        limiter.clear("a").await;
        assert!(limiter.check("a").await.is_ok());

        limiter.record_at("stale", Utc::now() - Duration::hours(1)).await;
        limiter.record("fresh").await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked_keys().await, 1);
    }

    #[tokio::test]
    async fn test_default_sign_in_limits() {
        let limiters = RateLimiters::new();
        for _ in 0..5 {
            assert!(limiters.sign_in_email.check("a@example.com").await.is_ok());
            limiters.sign_in_email.record("a@example.com").await;
        }
        assert!(limiters.sign_in_email.check("a@example.com").await.is_err());
        assert!(limiters.sign_in_ip.check("127.0.0.1").await.is_ok());
    }
}
