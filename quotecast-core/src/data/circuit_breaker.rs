//! Circuit breaker for quote provider rate limiting and IP bans.
//!
//! When the provider returns HTTP 403 (IP ban) or keeps failing, the breaker
//! trips and refuses all subsequent requests for a cooldown period. A tripped
//! breaker makes the exchange-rate lookup fall back immediately instead of
//! blocking every pipeline run on a dead upstream.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// State of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation, requests are allowed.
    Closed { consecutive_failures: u32 },
    /// Tripped: all requests are refused until cooldown expires.
    Open { tripped_at: Instant },
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            state: Mutex::new(BreakerState::Closed {
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// Default breaker: 5-minute cooldown, trips after 3 consecutive failures.
    ///
    /// Intraday refresh loops poll every minute, so the cooldown is short
    /// compared to a daily-bar downloader.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_secs(5 * 60), 3)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut BreakerState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Check if requests are currently allowed. An expired cooldown resets
    /// the breaker to closed.
    pub fn is_allowed(&self) -> bool {
        let cooldown = self.cooldown;
        self.with_state(|state| match *state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { tripped_at } if tripped_at.elapsed() >= cooldown => {
                *state = BreakerState::Closed {
                    consecutive_failures: 0,
                };
                true
            }
            BreakerState::Open { .. } => false,
        })
    }

    pub fn record_success(&self) {
        self.with_state(|state| {
            *state = BreakerState::Closed {
                consecutive_failures: 0,
            }
        });
    }

    /// Record a failure; trips once the threshold is reached.
    pub fn record_failure(&self) {
        let threshold = self.failure_threshold;
        let tripped = self.with_state(|state| match *state {
            BreakerState::Closed {
                consecutive_failures,
            } => {
                let failures = consecutive_failures + 1;
                if failures >= threshold {
                    *state = BreakerState::Open {
                        tripped_at: Instant::now(),
                    };
                    true
                } else {
                    *state = BreakerState::Closed {
                        consecutive_failures: failures,
                    };
                    false
                }
            }
            BreakerState::Open { .. } => false,
        });
        if tripped {
            log::warn!(
                "circuit breaker tripped after {threshold} consecutive failures; pausing requests for {}s",
                self.cooldown.as_secs()
            );
        }
    }

    /// Immediately trip the breaker (for 403 Forbidden / IP ban).
    pub fn trip(&self) {
        self.with_state(|state| {
            *state = BreakerState::Open {
                tripped_at: Instant::now(),
            }
        });
        log::warn!("circuit breaker tripped by provider ban");
    }

    /// Remaining cooldown time (zero if not tripped).
    pub fn remaining_cooldown(&self) -> Duration {
        let cooldown = self.cooldown;
        self.with_state(|state| match *state {
            BreakerState::Closed { .. } => Duration::ZERO,
            BreakerState::Open { tripped_at } => cooldown.saturating_sub(tripped_at.elapsed()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let cb = CircuitBreaker::new(Duration::from_secs(60), 3);
        assert!(cb.is_allowed());
        assert_eq!(cb.remaining_cooldown(), Duration::ZERO);
    }

    #[test]
    fn trips_after_threshold_failures() {
        let cb = CircuitBreaker::new(Duration::from_secs(60), 3);
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_allowed());
        cb.record_failure();
        assert!(!cb.is_allowed());
        assert!(cb.remaining_cooldown() > Duration::ZERO);
    }

    #[test]
    fn success_resets_counter() {
        let cb = CircuitBreaker::new(Duration::from_secs(60), 3);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        assert!(cb.is_allowed());
    }

    #[test]
    fn expires_after_cooldown() {
        let cb = CircuitBreaker::new(Duration::from_millis(10), 3);
        cb.trip();
        assert!(!cb.is_allowed());
        std::thread::sleep(Duration::from_millis(15));
        assert!(cb.is_allowed());
    }
}
