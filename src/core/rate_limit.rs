use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

/// Sliding-window limiter keyed by Telegram user id.
///
/// Each user keeps the timestamps of accepted requests inside the window.
/// Rejected attempts are not recorded, so hammering the bot does not extend the wait.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: TimeDelta,
    history: DashMap<i64, VecDeque<DateTime<Utc>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window: TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX),
            history: DashMap::new(),
        }
    }

    pub fn check(&self, user_id: i64) -> RateDecision {
        self.check_at(user_id, Utc::now())
    }

    pub fn check_at(&self, user_id: i64, now: DateTime<Utc>) -> RateDecision {
        let mut entry = self.history.entry(user_id).or_default();
        let timestamps = entry.value_mut();

        while let Some(oldest) = timestamps.front() {
            if now.signed_duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.max_requests {
            let oldest = timestamps.front().copied().unwrap_or(now);
            let wait = self.window - now.signed_duration_since(oldest);
            let retry_after = Duration::from_secs(wait.num_seconds().max(0) as u64);
            return RateDecision::Limited { retry_after };
        }

        timestamps.push_back(now);
        RateDecision::Allowed {
            remaining: self.max_requests - timestamps.len(),
        }
    }

    /// Drops users whose whole history fell out of the window.
    pub fn prune(&self, now: DateTime<Utc>) {
        self.history.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|last| now.signed_duration_since(*last) < self.window)
        });
    }

    pub fn tracked_users(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn test_allows_up_to_max_then_limits() {
        let limiter = RateLimiter::new(3, Duration::from_secs(3600));

        assert_eq!(limiter.check_at(1, at(0)), RateDecision::Allowed { remaining: 2 });
        assert_eq!(limiter.check_at(1, at(10)), RateDecision::Allowed { remaining: 1 });
        assert_eq!(limiter.check_at(1, at(20)), RateDecision::Allowed { remaining: 0 });
        assert_eq!(
            limiter.check_at(1, at(100)),
            RateDecision::Limited {
                retry_after: Duration::from_secs(3500)
            }
        );
    }

    #[test]
    fn test_window_slides() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));

        limiter.check_at(7, at(0));
        limiter.check_at(7, at(30));
        assert!(matches!(limiter.check_at(7, at(59)), RateDecision::Limited { .. }));

        // the first request expires at t=60
        assert_eq!(limiter.check_at(7, at(60)), RateDecision::Allowed { remaining: 0 });
        assert!(matches!(limiter.check_at(7, at(61)), RateDecision::Limited { .. }));
    }

    #[test]
    fn test_rejections_are_not_recorded() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));

        limiter.check_at(5, at(0));
        for t in 1..50 {
            assert!(matches!(limiter.check_at(5, at(t)), RateDecision::Limited { .. }));
        }
        assert_eq!(limiter.check_at(5, at(60)), RateDecision::Allowed { remaining: 0 });
    }

    #[test]
    fn test_users_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(3600));

        assert!(matches!(limiter.check_at(1, at(0)), RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check_at(2, at(0)), RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check_at(1, at(1)), RateDecision::Limited { .. }));
    }

    #[test]
    fn test_prune_forgets_idle_users() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        limiter.check_at(1, at(0));
        limiter.check_at(2, at(50));

        limiter.prune(at(70));
        assert_eq!(limiter.tracked_users(), 1);
    }
}
