use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::{sleep_until, Duration, Instant};

// Paces calls against the market-data provider's request budget. Instead of
// measuring elapsed time per call, a shared schedule hands every caller the
// next free slot, spaced one interval apart; callers sleep until their slot
// comes up. Queued callers therefore fire in reservation order, and a burst
// of N requests drains in N intervals. A semaphore additionally caps how
// many requests are in flight at once.
pub struct RateLimiter {
    inflight: Semaphore,
    next_slot: Mutex<Instant>,
    interval: Duration,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize, requests_per_minute: u32) -> Self {
        Self {
            inflight: Semaphore::new(max_concurrent),
            next_slot: Mutex::new(Instant::now()),
            interval: Duration::from_secs(60) / requests_per_minute.max(1),
        }
    }

    /// Reserve the next free slot and wait for it. The returned guard holds
    /// the in-flight permit until dropped.
    pub async fn acquire(&self) -> RateLimitGuard<'_> {
        let permit = self.inflight.acquire().await.unwrap();

        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + self.interval;
            slot
        };
        sleep_until(slot).await;

        RateLimitGuard { _permit: permit }
    }
}

pub struct RateLimitGuard<'a> {
    _permit: SemaphorePermit<'a>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn consecutive_requests_are_spaced_one_interval_apart() {
        // 600 per minute = 100ms slots.
        let limiter = RateLimiter::new(4, 600);

        let start = Instant::now();
        for _ in 0..3 {
            drop(limiter.acquire().await);
        }
        // First slot fires immediately; the next two wait 100ms each.
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn a_burst_of_callers_gets_distinct_slots() {
        // 1200 per minute = 50ms slots.
        let limiter = Arc::new(RateLimiter::new(8, 1200));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    let _guard = limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut fire_times = Vec::new();
        for handle in handles {
            fire_times.push(handle.await.unwrap());
        }
        fire_times.sort();

        // Allow a little timer slop below the nominal 50ms spacing.
        for pair in fire_times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(45));
        }
    }

    #[tokio::test]
    async fn inflight_cap_blocks_until_a_guard_drops() {
        let limiter = Arc::new(RateLimiter::new(1, 60_000));

        let held = limiter.acquire().await;
        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let _guard = limiter.acquire().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap();
    }
}
