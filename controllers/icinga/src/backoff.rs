//! # Retry backoff
//!
//! Per-key retry delays for the work queues: exponential growth with
//! multiplicative jitter, capped at a maximum delay. The jitter spreads
//! retries of many keys that failed at the same time (a backend outage
//! fails every in-flight key at once).

use std::time::Duration;

use rand::Rng;

/// Exponential backoff policy
///
/// `delay_for_attempt` is stateless: the work queue tracks the per-key
/// attempt count and asks for the matching delay, so a `forget` on the key
/// resets the sequence without touching the policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub initial: Duration,
    /// Upper bound for any delay
    pub max: Duration,
    /// Growth factor between attempts
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// The un-jittered delay for the given attempt (1-based)
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exp as i32);
        Duration::from_secs_f64(secs.min(self.max.as_secs_f64()))
    }

    /// The delay for the given attempt with jitter applied (0.5x to 1.5x),
    /// still capped at the maximum
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        let jittered = Duration::from_secs_f64(base.as_secs_f64() * jitter);
        jittered.min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_delay_doubles() {
        let policy = RetryPolicy {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
            multiplier: 2.0,
        };

        assert_eq!(policy.base_delay(1), Duration::from_secs(1));
        assert_eq!(policy.base_delay(2), Duration::from_secs(2));
        assert_eq!(policy.base_delay(3), Duration::from_secs(4));
        assert_eq!(policy.base_delay(4), Duration::from_secs(8));
    }

    #[test]
    fn base_delay_is_capped() {
        let policy = RetryPolicy {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
            multiplier: 2.0,
        };

        assert_eq!(policy.base_delay(5), Duration::from_secs(10));
        assert_eq!(policy.base_delay(30), Duration::from_secs(10));
        // Large attempt counts must not overflow the exponent.
        assert_eq!(policy.base_delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            initial: Duration::from_secs(4),
            max: Duration::from_secs(600),
            multiplier: 2.0,
        };

        for attempt in 1..6 {
            let base = policy.base_delay(attempt).as_secs_f64();
            for _ in 0..100 {
                let d = policy.delay_for_attempt(attempt).as_secs_f64();
                assert!(d >= base * 0.5, "delay {d} below jitter floor");
                assert!(d <= base * 1.5, "delay {d} above jitter ceiling");
            }
        }
    }

    #[test]
    fn jittered_delay_never_exceeds_max() {
        let policy = RetryPolicy {
            initial: Duration::from_secs(8),
            max: Duration::from_secs(10),
            multiplier: 2.0,
        };

        for _ in 0..100 {
            assert!(policy.delay_for_attempt(4) <= Duration::from_secs(10));
        }
    }
}
