use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
}

impl RateLimitConfig {
    pub fn reddit_oauth() -> Self {
        Self {
            max_requests: 60, // Reddit allows 60 requests per minute per OAuth client
            time_window: Duration::from_secs(60),
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            time_window: Duration::from_secs(60),
        }
    }
}

/// Timestamps of requests inside the trailing window, oldest first, plus
/// the slots held by requests still in flight.
#[derive(Debug)]
pub struct RequestBudget {
    window: Duration,
    timestamps: VecDeque<Instant>,
    pending: u32,
}

impl RequestBudget {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            timestamps: VecDeque::new(),
            pending: 0,
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn len(&self) -> u32 {
        self.timestamps.len() as u32
    }

    fn in_use(&self) -> u32 {
        self.len() + self.pending
    }

    /// Time until the oldest entry leaves the window.
    fn wait_for_oldest(&self, now: Instant) -> Duration {
        match self.timestamps.front() {
            Some(&oldest) => self.window.saturating_sub(now.duration_since(oldest)),
            None => self.window,
        }
    }
}

fn lock(budget: &Mutex<RequestBudget>) -> MutexGuard<'_, RequestBudget> {
    budget.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    budget: Arc<Mutex<RequestBudget>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let budget = Arc::new(Mutex::new(RequestBudget::new(config.time_window)));
        Self { config, budget }
    }

    /// Holds one slot in the trailing window.
    ///
    /// Being exactly at the ceiling, counting slots already held, is a
    /// failure. On failure the returned duration is the wait until the
    /// oldest request ages out.
    pub fn reserve(&self) -> Result<Reservation, Duration> {
        let now = Instant::now();
        let mut budget = lock(&self.budget);
        budget.prune(now);

        if budget.in_use() < self.config.max_requests {
            budget.pending += 1;
            Ok(Reservation {
                budget: Arc::clone(&self.budget),
                settled: false,
            })
        } else {
            let retry_after = budget.wait_for_oldest(now);
            debug!(
                window_requests = budget.len(),
                in_flight = budget.pending,
                ceiling = self.config.max_requests,
                "Request budget exhausted, retry after {:?}",
                retry_after
            );
            Err(retry_after)
        }
    }

    pub fn status(&self) -> RateLimitStatus {
        let now = Instant::now();
        let mut budget = lock(&self.budget);
        budget.prune(now);

        let retry_after = if budget.in_use() >= self.config.max_requests {
            Some(budget.wait_for_oldest(now))
        } else {
            None
        };

        RateLimitStatus {
            requests_per_window: self.config.max_requests,
            window: self.config.time_window,
            current_window_requests: budget.len(),
            in_flight: budget.pending,
            retry_after,
        }
    }
}

/// A slot held in the request budget.
///
/// [`record`](Self::record) turns it into a timestamp in the window;
/// dropping it unrecorded gives the slot back.
#[derive(Debug)]
#[must_use = "dropping a reservation releases its slot"]
pub struct Reservation {
    budget: Arc<Mutex<RequestBudget>>,
    settled: bool,
}

impl Reservation {
    /// Counts the request as completed at the current instant.
    pub fn record(mut self) {
        let now = Instant::now();
        let mut budget = lock(&self.budget);
        budget.prune(now);
        budget.pending = budget.pending.saturating_sub(1);
        budget.timestamps.push_back(now);
        self.settled = true;
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.settled {
            let mut budget = lock(&self.budget);
            budget.pending = budget.pending.saturating_sub(1);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub requests_per_window: u32,
    pub window: Duration,
    pub current_window_requests: u32,
    pub in_flight: u32,
    pub retry_after: Option<Duration>,
}

impl RateLimitStatus {
    pub fn requests_remaining_in_window(&self) -> u32 {
        self.requests_per_window
            .saturating_sub(self.current_window_requests + self.in_flight)
    }

    pub fn window_utilization_percentage(&self) -> f64 {
        if self.requests_per_window == 0 {
            return 100.0;
        }
        (self.current_window_requests as f64 / self.requests_per_window as f64) * 100.0
    }

    pub fn is_near_limit(&self) -> bool {
        self.window_utilization_percentage() > 80.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn fill(limiter: &RateLimiter, count: u32) {
        for i in 0..count {
            limiter
                .reserve()
                .unwrap_or_else(|_| panic!("request {} should fit in the window", i + 1))
                .record();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sixty_requests_fit_sixty_first_fails() {
        let limiter = RateLimiter::new(RateLimitConfig::reddit_oauth());
        fill(&limiter, 60);

        let retry_after = limiter.reserve().unwrap_err();
        assert!(retry_after > Duration::ZERO);
        assert_eq!(retry_after, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spread_requests_and_retry_after() {
        let limiter = RateLimiter::new(RateLimitConfig::reddit_oauth());

        // One request per second for 60 seconds, all inside one window
        for _ in 0..60 {
            limiter.reserve().unwrap().record();
            advance(Duration::from_millis(990)).await;
        }

        // Oldest entry is 59.4s old
        let retry_after = limiter.reserve().unwrap_err();
        assert_eq!(retry_after, Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_restored_after_window() {
        let limiter = RateLimiter::new(RateLimitConfig::per_minute(3));
        fill(&limiter, 3);
        assert!(limiter.reserve().is_err());

        advance(Duration::from_secs(30)).await;
        assert_eq!(
            limiter.reserve().unwrap_err(),
            Duration::from_secs(30)
        );

        advance(Duration::from_secs(30)).await;
        assert!(limiter.reserve().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_held_slots_count_against_ceiling() {
        let limiter = RateLimiter::new(RateLimitConfig::per_minute(2));
        let first = limiter.reserve().unwrap();
        let second = limiter.reserve().unwrap();

        // Both slots are in flight; nothing has been recorded yet
        assert!(limiter.reserve().is_err());
        let status = limiter.status();
        assert_eq!(status.current_window_requests, 0);
        assert_eq!(status.in_flight, 2);
        assert_eq!(status.requests_remaining_in_window(), 0);

        first.record();
        second.record();
        assert!(limiter.reserve().is_err());
        assert_eq!(limiter.status().current_window_requests, 2);
        assert_eq!(limiter.status().in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_reservation_releases_slot() {
        let limiter = RateLimiter::new(RateLimitConfig::per_minute(1));
        let held = limiter.reserve().unwrap();
        assert!(limiter.reserve().is_err());

        drop(held);
        assert_eq!(limiter.status().in_flight, 0);
        assert_eq!(limiter.status().current_window_requests, 0);

        limiter.reserve().unwrap().record();
        assert!(limiter.reserve().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reporting() {
        let limiter = RateLimiter::new(RateLimitConfig::per_minute(5));
        fill(&limiter, 4);

        let status = limiter.status();
        assert_eq!(status.current_window_requests, 4);
        assert_eq!(status.requests_remaining_in_window(), 1);
        assert!(status.retry_after.is_none());
        assert_eq!(status.window_utilization_percentage(), 80.0);
        assert!(!status.is_near_limit());

        fill(&limiter, 1);
        let status = limiter.status();
        assert_eq!(status.requests_remaining_in_window(), 0);
        assert_eq!(status.retry_after, Some(Duration::from_secs(60)));
        assert!(status.is_near_limit());
    }

    #[tokio::test]
    async fn test_zero_ceiling_always_fails() {
        let limiter = RateLimiter::new(RateLimitConfig::per_minute(0));
        assert_eq!(
            limiter.reserve().unwrap_err(),
            Duration::from_secs(60)
        );
    }
}
