//! Token-bucket gate for outbound requests.

use crate::error::RateLimitError;
use std::sync::{Mutex, MutexGuard};
use tokio::time::{Duration, Instant};

/// Token bucket allowing `per_second` requests per second with a burst of
/// the same size.
///
/// Waiters reserve their token up front, so they are served in arrival
/// order. All clock reads go through `tokio::time`, which lets tests drive
/// the limiter with a paused clock.
#[derive(Debug)]
pub struct RateLimiter {
    per_second: u32,
    bucket: Mutex<TokenBucket>,
}

#[derive(Debug)]
struct TokenBucket {
    /// Available tokens. Negative while reservations are outstanding.
    tokens: f64,
    max_tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
    /// When the most recently granted reservation may proceed.
    last_event: Instant,
}

impl TokenBucket {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }
}

impl RateLimiter {
    /// Creates a full bucket. A rate of zero is treated as one.
    pub fn new(per_second: u32) -> Self {
        let per_second = per_second.max(1);
        Self {
            per_second,
            bucket: Mutex::new(TokenBucket {
                tokens: f64::from(per_second),
                max_tokens: f64::from(per_second),
                refill_rate: f64::from(per_second),
                last_refill: Instant::now(),
                last_event: Instant::now(),
            }),
        }
    }

    /// Requests per second this limiter lets through.
    pub fn per_second(&self) -> u32 {
        self.per_second
    }

    /// Waits until a token is available.
    ///
    /// Fails without consuming a token if `deadline` has already passed or
    /// would pass before the token becomes available. If the returned future
    /// is dropped while waiting, the reserved token is handed back unless
    /// later waiters have already been scheduled into its slot.
    pub async fn wait(&self, deadline: Instant) -> Result<(), RateLimitError> {
        let ready_at = self.reserve(deadline)?;
        if ready_at <= Instant::now() {
            return Ok(());
        }

        let mut reservation = Reservation {
            limiter: self,
            ready_at,
            pending: true,
        };
        tokio::time::sleep_until(ready_at).await;
        reservation.pending = false;
        Ok(())
    }

    fn reserve(&self, deadline: Instant) -> Result<Instant, RateLimitError> {
        let now = Instant::now();
        if deadline <= now {
            return Err(RateLimitError::DeadlineExceeded);
        }

        let mut bucket = self.lock();
        bucket.refill(now);
        bucket.tokens -= 1.0;

        let ready_at = if bucket.tokens >= 0.0 {
            now
        } else {
            now + Duration::from_secs_f64(-bucket.tokens / bucket.refill_rate)
        };
        if ready_at > deadline {
            bucket.tokens += 1.0;
            return Err(RateLimitError::DeadlineExceeded);
        }
        bucket.last_event = bucket.last_event.max(ready_at);
        Ok(ready_at)
    }

    /// Returns what is left of an abandoned reservation.
    ///
    /// Reservations granted after it already count on its slot, so only the
    /// part of the token not yet spoken for by them is restored.
    fn release(&self, ready_at: Instant) {
        let now = Instant::now();
        let mut bucket = self.lock();
        let claimed_after = bucket.last_event.saturating_duration_since(ready_at);
        let restore = 1.0 - claimed_after.as_secs_f64() * bucket.refill_rate;
        if restore <= 0.0 {
            return;
        }
        bucket.refill(now);
        bucket.tokens = (bucket.tokens + restore).min(bucket.max_tokens);
    }

    fn lock(&self) -> MutexGuard<'_, TokenBucket> {
        match self.bucket.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // Token accounting stays usable after a panic elsewhere; a
                // stale count is better than refusing every request.
                tracing::error!("rate limiter lock poisoned, recovering with stale state");
                poisoned.into_inner()
            }
        }
    }
}

/// Hands a reserved token back if the waiter goes away before it is due.
struct Reservation<'a> {
    limiter: &'a RateLimiter,
    ready_at: Instant,
    pending: bool,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.pending {
            self.limiter.release(self.ready_at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn burst_is_granted_immediately() {
        let limiter = RateLimiter::new(3);
        let start = Instant::now();
        let deadline = start + Duration::from_secs(1);

        for _ in 0..3 {
            limiter.wait(deadline).await.unwrap();
        }
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_refill_after_burst() {
        let limiter = RateLimiter::new(3);
        let start = Instant::now();
        let deadline = start + Duration::from_secs(5);

        for _ in 0..6 {
            limiter.wait(deadline).await.unwrap();
        }
        // Three from the burst, three more at one every third of a second.
        let elapsed = Instant::now() - start;
        assert!(elapsed >= Duration::from_millis(999), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1100), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_never_grants() {
        let limiter = RateLimiter::new(15);
        let now = Instant::now();

        assert_eq!(limiter.wait(now).await, Err(RateLimitError::DeadlineExceeded));

        // The failed calls consumed nothing: the full burst is still there.
        for _ in 0..15 {
            limiter.wait(now + Duration::from_millis(1)).await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_deadline_fails_fast_and_refunds() {
        let limiter = RateLimiter::new(1);
        let start = Instant::now();
        limiter.wait(start + Duration::from_secs(1)).await.unwrap();

        // Next token is a full second away.
        let err = limiter.wait(start + Duration::from_millis(10)).await;
        assert_eq!(err, Err(RateLimitError::DeadlineExceeded));
        assert_eq!(Instant::now(), start, "must fail without sleeping");

        // The refused reservation must not push later waiters back.
        limiter.wait(start + Duration::from_secs(2)).await.unwrap();
        let elapsed = Instant::now() - start;
        assert!(elapsed < Duration::from_millis(1100), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_waiter_returns_its_token() {
        let limiter = RateLimiter::new(1);
        let start = Instant::now();
        limiter.wait(start + Duration::from_secs(1)).await.unwrap();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(100),
            limiter.wait(start + Duration::from_secs(5)),
        )
        .await;
        assert!(abandoned.is_err());

        limiter.wait(start + Duration::from_secs(5)).await.unwrap();
        let elapsed = Instant::now() - start;
        assert!(elapsed < Duration::from_millis(1100), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_slot_is_not_handed_to_a_newcomer() {
        let limiter = Arc::new(RateLimiter::new(1));
        let start = Instant::now();
        let deadline = start + Duration::from_secs(10);
        limiter.wait(deadline).await.unwrap();

        // Reserves the slot at 1s, then gives up.
        let first = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.wait(deadline).await })
        };
        tokio::task::yield_now().await;

        // Already queued behind it, due at 2s.
        let second = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter.wait(deadline).await.unwrap();
                Instant::now()
            })
        };
        tokio::task::yield_now().await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        first.abort();
        let _ = first.await;

        limiter.wait(deadline).await.unwrap();
        let newcomer = Instant::now();
        let second = second.await.unwrap();

        let gap = if newcomer > second {
            newcomer - second
        } else {
            second - newcomer
        };
        assert!(gap >= Duration::from_millis(999), "granted {:?} apart", gap);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_fails_under_contention() {
        let limiter = Arc::new(RateLimiter::new(3));
        let now = Instant::now();

        let mut handles = Vec::new();
        for i in 0..60 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                // Half the tasks hold a live deadline and compete for tokens.
                if i % 2 == 0 {
                    limiter.wait(now).await.map(|_| false)
                } else {
                    limiter
                        .wait(now + Duration::from_secs(60))
                        .await
                        .map(|_| true)
                }
            }));
        }

        let mut granted = 0;
        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.await.expect("task should not panic");
            if i % 2 == 0 {
                assert_eq!(result, Err(RateLimitError::DeadlineExceeded));
            } else {
                assert_eq!(result, Ok(true));
                granted += 1;
            }
        }
        assert_eq!(granted, 30);
    }

    #[test]
    fn zero_rate_is_clamped() {
        assert_eq!(RateLimiter::new(0).per_second(), 1);
    }
}
