//! Reconnection policy.
//!
//! A pure function from attempt count to (delay, give up). All state (the
//! running attempt counter) lives in the connection state machine, which
//! keeps the policy trivially unit-testable.

use std::time::Duration;

/// Capped exponential backoff with a hard attempt limit.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    /// Delay for the first retry.
    pub base_delay: Duration,
    /// Ceiling on any single delay.
    pub max_delay: Duration,
    /// Attempts after which the connection is abandoned.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            max_attempts: 5,
        }
    }
}

/// Outcome of consulting the policy after a disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyDecision {
    pub delay: Duration,
    pub give_up: bool,
}

impl ReconnectPolicy {
    /// Decide what to do after the given (post-increment) attempt number.
    ///
    /// attempt=1 -> base, attempt=2 -> 2*base, attempt=3 -> 4*base, all
    /// capped at `max_delay`.
    pub fn decide(&self, attempts: u32) -> PolicyDecision {
        let base_ms = self.base_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;

        let exponent = attempts.saturating_sub(1).min(10);
        let delay_ms = base_ms.saturating_mul(1u64 << exponent).min(max_ms);

        PolicyDecision {
            delay: Duration::from_millis(delay_ms),
            give_up: attempts >= self.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_uses_base_delay() {
        let policy = ReconnectPolicy::default();
        let decision = policy.decide(1);
        assert_eq!(decision.delay, Duration::from_secs(5));
        assert!(!decision.give_up);
    }

    #[test]
    fn test_delay_doubles_then_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.decide(2).delay, Duration::from_secs(10));
        assert_eq!(policy.decide(3).delay, Duration::from_secs(20));
        assert_eq!(policy.decide(4).delay, Duration::from_secs(40));
        // 80s would exceed the ceiling.
        assert_eq!(policy.decide(5).delay, Duration::from_secs(60));
        assert_eq!(policy.decide(9).delay, Duration::from_secs(60));
    }

    #[test]
    fn test_delay_is_non_decreasing() {
        let policy = ReconnectPolicy::default();
        let mut previous = Duration::ZERO;
        for attempts in 1..=20 {
            let delay = policy.decide(attempts).delay;
            assert!(delay >= previous, "delay shrank at attempt {attempts}");
            assert!(delay <= policy.max_delay);
            previous = delay;
        }
    }

    #[test]
    fn test_give_up_at_max_attempts() {
        let policy = ReconnectPolicy::default();
        assert!(!policy.decide(4).give_up);
        assert!(policy.decide(5).give_up);
        assert!(policy.decide(6).give_up);
    }

    #[test]
    fn test_large_attempt_count_does_not_overflow() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(3600),
            max_attempts: u32::MAX,
        };
        let decision = policy.decide(1000);
        assert_eq!(decision.delay, Duration::from_secs(3600));
    }
}
