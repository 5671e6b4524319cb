//! # Circuit Breaker Module
//!
//! Stops calling the LLM API after repeated failures so a Gemini outage turns
//! into fast "assistant unavailable" replies instead of stalled chats.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::config::RecoveryConfig;

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

/// Circuit breaker for outbound API calls
///
/// # State Machine
///
/// - **Closed**: Normal operation, requests pass through
/// - **Open**: Failure threshold exceeded, requests fail fast
/// - **Half-Open**: After the reset window one request is let through; a
///   success closes the circuit, a failure re-opens it
///
/// Uses `RecoveryConfig::circuit_breaker_threshold` and
/// `RecoveryConfig::circuit_breaker_reset_secs`.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    config: RecoveryConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    ///
    /// ```rust
    /// use nongor::config::RecoveryConfig;
    /// use nongor::circuit_breaker::CircuitBreaker;
    ///
    /// let breaker = CircuitBreaker::new(RecoveryConfig::default());
    /// assert!(!breaker.is_open());
    /// ```
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// `true` while the failure threshold is reached and the reset window has not elapsed
    pub fn is_open(&self) -> bool {
        self.is_open_at(Instant::now())
    }

    pub fn is_open_at(&self, now: Instant) -> bool {
        let mut state = self.lock();

        if state.failure_count < self.config.circuit_breaker_threshold {
            return false;
        }

        match state.last_failure_time {
            Some(last) if now.saturating_duration_since(last) < self.reset_window() => true,
            _ => {
                // Half-open: allow one trial call, a single further failure re-opens
                state.failure_count = self.config.circuit_breaker_threshold.saturating_sub(1);
                false
            }
        }
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    pub fn record_failure_at(&self, now: Instant) {
        let mut state = self.lock();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure_time = Some(now);
    }

    pub fn record_success(&self) {
        let mut state = self.lock();
        state.failure_count = 0;
        state.last_failure_time = None;
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    fn reset_window(&self) -> Duration {
        Duration::from_secs(self.config.circuit_breaker_reset_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RecoveryConfig {
        RecoveryConfig {
            circuit_breaker_threshold: 3,
            circuit_breaker_reset_secs: 60,
            ..RecoveryConfig::default()
        }
    }

    #[test]
    fn test_opens_after_threshold() {
        let breaker = CircuitBreaker::new(config());
        let t0 = Instant::now();
        breaker.record_failure_at(t0);
        breaker.record_failure_at(t0);
        assert!(!breaker.is_open_at(t0));
        breaker.record_failure_at(t0);
        assert!(breaker.is_open_at(t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_half_open_after_reset_window() {
        let breaker = CircuitBreaker::new(config());
        let t0 = Instant::now();
        for _ in 0..3 {
            breaker.record_failure_at(t0);
        }
        let later = t0 + Duration::from_secs(61);
        assert!(!breaker.is_open_at(later));

        // The trial call fails: straight back to open
        breaker.record_failure_at(later);
        assert!(breaker.is_open_at(later + Duration::from_secs(1)));
    }

    #[test]
    fn test_success_closes() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert!(breaker.is_open());
        breaker.record_success();
        assert!(!breaker.is_open());
        assert_eq!(breaker.failure_count(), 0);
    }
}
