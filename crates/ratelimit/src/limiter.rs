//! Token-bucket admission limiter.

use std::sync::{Arc, Mutex};

use crate::Clock;

/// Floating-point refill can land a hair under a whole token; treat credit
/// within this margin as a full unit.
const TOKEN_EPSILON: f64 = 1e-9;

/// Bucket state guarded by the limiter's own lock.
#[derive(Clone, Copy, Debug)]
struct Bucket {
    tokens: f64,
    last_refill_ms: u64,
}

/// Admission gate enforcing a maximum sustained rate of items per second.
///
/// A classic token bucket: credit accrues continuously at the configured
/// rate, capped at one second's worth of burst. [`wait_to_push`] consumes one
/// unit of credit, suspending the caller until credit is available. With a
/// rate of zero the limiter is an identity gate and never suspends.
///
/// The limiter holds no lock of its caller; it is safe to call from any
/// number of producers concurrently.
///
/// [`wait_to_push`]: RateLimiter::wait_to_push
pub struct RateLimiter {
    rate_per_second: Option<f64>,
    bucket: Mutex<Bucket>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Creates a limiter admitting at most `max_per_second` items per second.
    ///
    /// A `max_per_second` of zero means unlimited.
    pub fn new(max_per_second: u32, clock: Arc<dyn Clock>) -> Self {
        let rate_per_second = (max_per_second > 0).then(|| f64::from(max_per_second));
        tracing::debug!(max_per_second, "Created admission limiter");
        Self {
            rate_per_second,
            bucket: Mutex::new(Bucket { tokens: 0.0, last_refill_ms: clock.now_millis() }),
            clock,
        }
    }

    /// Returns the configured rate, or `None` when unlimited.
    pub fn rate_per_second(&self) -> Option<f64> {
        self.rate_per_second
    }

    /// Returns true if the limiter never throttles.
    pub fn is_unlimited(&self) -> bool {
        self.rate_per_second.is_none()
    }

    /// Consumes one unit of admission credit, waiting for it if necessary.
    ///
    /// Returns immediately when the limiter is unlimited.
    pub async fn wait_to_push(&self) {
        let Some(rate) = self.rate_per_second else { return };
        loop {
            let deadline_ms = {
                let mut bucket = self.bucket.lock().unwrap();
                let now = self.clock.now_millis();
                let elapsed_ms = now.saturating_sub(bucket.last_refill_ms);
                if elapsed_ms > 0 {
                    bucket.tokens = (bucket.tokens + elapsed_ms as f64 * rate / 1000.0).min(rate);
                    bucket.last_refill_ms = now;
                }
                if bucket.tokens + TOKEN_EPSILON >= 1.0 {
                    bucket.tokens = (bucket.tokens - 1.0).max(0.0);
                    return;
                }
                let deficit = 1.0 - bucket.tokens;
                now + (deficit * 1000.0 / rate).ceil() as u64
            };
            // Credit may have been consumed by another producer while we
            // slept; the loop re-checks before admitting.
            self.clock.wait_until(deadline_ms).await;
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate_per_second", &self.rate_per_second)
            .field("bucket", &*self.bucket.lock().unwrap())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use crate::ManualClock;

    use super::*;

    fn limited(rate: u32, start_ms: u64) -> (Arc<ManualClock>, Arc<RateLimiter>) {
        let clock = Arc::new(ManualClock::new(start_ms));
        let limiter = Arc::new(RateLimiter::new(rate, Arc::clone(&clock) as Arc<dyn Clock>));
        (clock, limiter)
    }

    #[rstest]
    #[case(0, None)]
    #[case(1, Some(1.0))]
    #[case(1000, Some(1000.0))]
    fn rate_accessor(#[case] max_per_second: u32, #[case] expected: Option<f64>) {
        let (_, limiter) = limited(max_per_second, 0);
        assert_eq!(limiter.rate_per_second(), expected);
        assert_eq!(limiter.is_unlimited(), expected.is_none());
    }

    #[tokio::test]
    async fn unlimited_never_waits() {
        let (_, limiter) = limited(0, 0);
        for _ in 0..1000 {
            tokio::time::timeout(Duration::from_millis(10), limiter.wait_to_push())
                .await
                .expect("unlimited limiter must not wait");
        }
    }

    #[tokio::test]
    async fn first_push_waits_for_initial_credit() {
        let (clock, limiter) = limited(2, 0);

        let waiter = tokio::spawn({
            let limiter = Arc::clone(&limiter);
            async move { limiter.wait_to_push().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "no credit accrued yet");

        // One token at 2/s takes 500 ms.
        clock.advance(500);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should admit once credit accrues")
            .unwrap();
    }

    #[tokio::test]
    async fn accrued_credit_admits_without_waiting() {
        let (clock, limiter) = limited(10, 0);

        // A full second accrues 10 tokens.
        clock.advance(1000);
        for _ in 0..10 {
            tokio::time::timeout(Duration::from_millis(10), limiter.wait_to_push())
                .await
                .expect("accrued credit should admit immediately");
        }

        // Credit exhausted; the next admission must wait.
        let waiter = tokio::spawn({
            let limiter = Arc::clone(&limiter);
            async move { limiter.wait_to_push().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        clock.advance(100);
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn burst_is_capped_at_one_second_of_credit() {
        let (clock, limiter) = limited(5, 0);

        // A long idle period must not accrue more than one second of burst.
        clock.advance(60_000);
        for _ in 0..5 {
            tokio::time::timeout(Duration::from_millis(10), limiter.wait_to_push())
                .await
                .expect("burst credit should admit immediately");
        }

        let waiter = tokio::spawn({
            let limiter = Arc::clone(&limiter);
            async move { limiter.wait_to_push().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "burst beyond the cap must throttle");

        clock.advance(200);
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }

    #[test]
    fn debug_does_not_panic() {
        let (_, limiter) = limited(3, 0);
        let rendered = format!("{:?}", limiter);
        assert!(rendered.contains("RateLimiter"));
    }
}
