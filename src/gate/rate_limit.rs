//! Fixed-window rate limiting per client address.
//!
//! # Design Decisions
//! - Keyed by the forwarding headers only; clients without them share the
//!   `unknown` bucket (accepted degradation, not a bug)
//! - Entries live in a sharded `DashMap`; expired windows are swept
//!   periodically and the map never grows past `max_tracked_clients`
//! - At the cap, clients are evicted in admission order from a queue, so a
//!   flood of new keys costs O(1) each; the inline sweep is rate-limited to
//!   one per `sweep_interval_secs`
//! - Runs before identity resolution, so anonymous traffic is limited too

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Key shared by every client without forwarding headers.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Client address from `x-forwarded-for` (first hop), then `x-real-ip`.
pub fn client_key(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    reset_at: Instant,
    /// Matches the entry's slot in the admission queue.
    seq: u64,
}

/// Process-wide fixed-window counters.
///
/// Lock order is admission queue, then map shard. No map guard is held
/// while the queue is locked from `check_at`.
#[derive(Debug, Default)]
pub struct RateLimiter {
    entries: DashMap<String, WindowEntry>,
    admitted: Mutex<VecDeque<(String, u64)>>,
    next_seq: AtomicU64,
    last_sweep: Mutex<Option<Instant>>,
    sweeps: AtomicU64,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the request is allowed.
    pub fn check(&self, key: &str, config: &RateLimitConfig) -> bool {
        self.check_at(key, Instant::now(), config)
    }

    pub fn check_at(&self, key: &str, now: Instant, config: &RateLimitConfig) -> bool {
        let cap = config.max_tracked_clients;
        if !self.entries.contains_key(key) && self.entries.len() >= cap {
            self.make_room(now, cap, Duration::from_secs(config.sweep_interval_secs));
        }

        let window = Duration::from_millis(config.window_ms);
        let mut admitted_seq = None;
        let allowed = {
            let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                admitted_seq = Some(seq);
                WindowEntry {
                    count: 0,
                    reset_at: now,
                    seq,
                }
            });

            if now >= entry.reset_at {
                entry.count = 1;
                entry.reset_at = now + window;
                true
            } else {
                entry.count = entry.count.saturating_add(1);
                entry.count <= config.max_requests
            }
        };

        if let Some(seq) = admitted_seq {
            if let Ok(mut admitted) = self.admitted.lock() {
                admitted.push_back((key.to_string(), seq));
            }
        }
        allowed
    }

    /// Drop every entry whose window has ended. Returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_sweep.lock() {
            *last = Some(now);
        }

        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.reset_at > now);
        let removed = before.saturating_sub(self.entries.len());

        if let Ok(mut admitted) = self.admitted.lock() {
            admitted.retain(|(key, seq)| {
                self.entries.get(key).is_some_and(|e| e.seq == *seq)
            });
        }

        metrics::record_rate_limit_clients(self.entries.len());
        removed
    }

    /// Number of client addresses currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.entries.len()
    }

    /// Bring the map below `cap`. The inline sweep runs at most once per
    /// `sweep_interval`; otherwise the longest-tracked clients are evicted.
    fn make_room(&self, now: Instant, cap: usize, sweep_interval: Duration) {
        let sweep_due = match self.last_sweep.lock() {
            Ok(last) => match *last {
                Some(at) => now.saturating_duration_since(at) >= sweep_interval,
                None => true,
            },
            Err(_) => false,
        };
        if sweep_due {
            self.sweep(now);
        }

        let mut evicted = 0usize;
        while self.entries.len() >= cap {
            if !self.evict_oldest() {
                break;
            }
            evicted += 1;
        }
        if evicted > 0 {
            tracing::warn!(evicted, cap, "Rate limiter at capacity, evicted longest-tracked clients");
        }
    }

    /// Remove the longest-tracked live entry. False once nothing is left to evict.
    fn evict_oldest(&self) -> bool {
        let Ok(mut admitted) = self.admitted.lock() else {
            return false;
        };
        while let Some((key, seq)) = admitted.pop_front() {
            // Slots for swept or re-admitted keys are stale; skip them.
            if self.entries.remove_if(&key, |_, e| e.seq == seq).is_some() {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config() -> RateLimitConfig {
        RateLimitConfig::default()
    }

    #[test]
    fn test_hundred_allowed_then_rejected() {
        let limiter = RateLimiter::new();
        let cfg = config();
        let now = Instant::now();
        for i in 0..100 {
            assert!(limiter.check_at("1.1.1.1", now, &cfg), "request {} rejected", i + 1);
        }
        assert!(!limiter.check_at("1.1.1.1", now, &cfg));
        assert!(!limiter.check_at("1.1.1.1", now + Duration::from_secs(59), &cfg));
        // Other clients are unaffected.
        assert!(limiter.check_at("2.2.2.2", now, &cfg));
    }

    #[test]
    fn test_window_resets_at_expiry() {
        let limiter = RateLimiter::new();
        let cfg = RateLimitConfig {
            max_requests: 2,
            ..config()
        };
        let start = Instant::now();
        assert!(limiter.check_at("k", start, &cfg));
        assert!(limiter.check_at("k", start, &cfg));
        assert!(!limiter.check_at("k", start, &cfg));

        let expiry = start + Duration::from_millis(cfg.window_ms);
        assert!(limiter.check_at("k", expiry, &cfg));
        assert!(limiter.check_at("k", expiry, &cfg));
        assert!(!limiter.check_at("k", expiry, &cfg));
    }

    #[test]
    fn test_sweep_removes_expired() {
        let limiter = RateLimiter::new();
        let cfg = config();
        let start = Instant::now();
        limiter.check_at("a", start, &cfg);
        limiter.check_at("b", start + Duration::from_secs(30), &cfg);

        let removed = limiter.sweep(start + Duration::from_secs(61));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_capacity_is_bounded() {
        let limiter = RateLimiter::new();
        let cfg = RateLimitConfig {
            max_tracked_clients: 3,
            ..config()
        };
        let start = Instant::now();
        for (i, key) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            assert!(limiter.check_at(key, start + Duration::from_millis(i as u64), &cfg));
        }
        assert_eq!(limiter.tracked_clients(), 3);
        // Longest-tracked clients go first.
        assert!(!limiter.entries.contains_key("a"));
        assert!(!limiter.entries.contains_key("b"));
        assert!(limiter.entries.contains_key("e"));
    }

    #[test]
    fn test_new_keys_at_cap_skip_full_sweeps() {
        let limiter = RateLimiter::new();
        let cfg = RateLimitConfig {
            max_tracked_clients: 1_000,
            ..config()
        };
        let start = Instant::now();
        for i in 0..1_000 {
            limiter.check_at(&format!("client-{i}"), start, &cfg);
        }
        assert_eq!(limiter.sweeps.load(Ordering::Relaxed), 0);

        // Rotating addresses inside one sweep interval: a single inline sweep,
        // then constant-time evictions.
        for i in 0..5_000 {
            let now = start + Duration::from_millis(i);
            assert!(limiter.check_at(&format!("rotating-{i}"), now, &cfg));
            assert_eq!(limiter.tracked_clients(), 1_000);
        }
        assert_eq!(limiter.sweeps.load(Ordering::Relaxed), 1);
        assert!(limiter.entries.contains_key("rotating-4999"));
        assert!(!limiter.entries.contains_key("rotating-3999"));

        // Once the interval has passed the next new key may sweep again.
        let later = start + Duration::from_secs(cfg.sweep_interval_secs) + Duration::from_secs(1);
        limiter.check_at("late", later, &cfg);
        assert_eq!(limiter.sweeps.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_lowered_cap_evicts_down_to_limit() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        for i in 0..10 {
            limiter.check_at(&format!("k{i}"), start, &config());
        }
        assert_eq!(limiter.tracked_clients(), 10);

        let smaller = RateLimitConfig {
            max_tracked_clients: 4,
            ..config()
        };
        limiter.check_at("new", start, &smaller);
        assert_eq!(limiter.tracked_clients(), 4);
        assert!(limiter.entries.contains_key("new"));
        assert!(limiter.entries.contains_key("k9"));
        assert!(!limiter.entries.contains_key("k6"));
    }

    #[test]
    fn test_readmitted_key_keeps_fresh_slot() {
        let limiter = RateLimiter::new();
        let cfg = RateLimitConfig {
            max_tracked_clients: 2,
            ..config()
        };
        let start = Instant::now();
        limiter.check_at("a", start, &cfg);
        limiter.check_at("b", start, &cfg);

        // "a" expires and is swept, then comes back as the newest client.
        let later = start + Duration::from_millis(cfg.window_ms) + Duration::from_secs(1);
        limiter.sweep(later);
        limiter.check_at("b", later, &cfg);
        limiter.check_at("a", later, &cfg);

        limiter.check_at("c", later, &cfg);
        assert!(limiter.entries.contains_key("a"));
        assert!(limiter.entries.contains_key("c"));
        assert!(!limiter.entries.contains_key("b"));
    }

    #[test]
    fn test_client_key_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers), UNKNOWN_CLIENT);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_key(&headers), "10.0.0.2");

        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));
        assert_eq!(client_key(&headers), "203.0.113.7");

        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        assert_eq!(client_key(&headers), "10.0.0.2");
    }
}
