//! Per-peer sliding-window invite rate limiting, driven by an injected
//! monotonic clock so tests never sleep in real time.

use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;
use rphone_identity::NodeId;

const ONE_MINUTE: Duration = Duration::from_secs(60);
const ONE_HOUR: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    pub max_per_minute: u32,
    pub max_per_hour: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_per_minute: 5,
            max_per_hour: 20,
        }
    }
}

/// Sliding-window limiter over per-peer invite timestamps. Timestamps are
/// monotonic durations-since-epoch as supplied by a `rphone_identity::Clock`
/// at the call site; the limiter itself never reads a clock.
pub struct RateLimiter {
    config: RateLimiterConfig,
    windows: DashMap<NodeId, VecDeque<Duration>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Prunes entries older than one hour, then checks both caps. Records
    /// `now` and returns `true` only if neither cap is exceeded.
    pub fn is_allowed(&self, peer: NodeId, now: Duration) -> bool {
        let mut entry = self.windows.entry(peer).or_default();
        let deque = entry.value_mut();

        while let Some(&front) = deque.front() {
            if now.saturating_sub(front) > ONE_HOUR {
                deque.pop_front();
            } else {
                break;
            }
        }

        let minute_count = deque
            .iter()
            .filter(|&&ts| now.saturating_sub(ts) <= ONE_MINUTE)
            .count() as u32;
        let hour_count = deque.len() as u32;

        if minute_count >= self.config.max_per_minute || hour_count >= self.config.max_per_hour {
            return false;
        }

        deque.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn allows_up_to_the_per_minute_cap_then_rejects() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_per_minute: 3,
            max_per_hour: 100,
        });
        let peer = NodeId::from_bytes([7u8; 32]);

        assert!(limiter.is_allowed(peer, secs(0)));
        assert!(limiter.is_allowed(peer, secs(1)));
        assert!(limiter.is_allowed(peer, secs(2)));
        assert!(!limiter.is_allowed(peer, secs(3)));
    }

    #[test]
    fn per_minute_window_clears_after_sixty_seconds() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_per_minute: 1,
            max_per_hour: 100,
        });
        let peer = NodeId::from_bytes([8u8; 32]);

        assert!(limiter.is_allowed(peer, secs(0)));
        assert!(!limiter.is_allowed(peer, secs(30)));
        assert!(limiter.is_allowed(peer, secs(61)));
    }

    #[test]
    fn per_hour_cap_applies_even_with_minute_cap_headroom() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_per_minute: 100,
            max_per_hour: 2,
        });
        let peer = NodeId::from_bytes([9u8; 32]);

        assert!(limiter.is_allowed(peer, secs(0)));
        assert!(limiter.is_allowed(peer, secs(500)));
        assert!(!limiter.is_allowed(peer, secs(1000)));
    }

    #[test]
    fn different_peers_have_independent_windows() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_per_minute: 1,
            max_per_hour: 100,
        });
        let a = NodeId::from_bytes([1u8; 32]);
        let b = NodeId::from_bytes([2u8; 32]);

        assert!(limiter.is_allowed(a, secs(0)));
        assert!(!limiter.is_allowed(a, secs(1)));
        assert!(limiter.is_allowed(b, secs(1)));
    }

    #[test]
    fn a_rejected_call_does_not_get_recorded() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_per_minute: 1,
            max_per_hour: 100,
        });
        let peer = NodeId::from_bytes([3u8; 32]);

        assert!(limiter.is_allowed(peer, secs(0)));
        assert!(!limiter.is_allowed(peer, secs(1)));
        // still rejected at t=2, not freshly allowed by a phantom record at t=1
        assert!(!limiter.is_allowed(peer, secs(2)));
        assert!(limiter.is_allowed(peer, secs(61)));
    }
}
