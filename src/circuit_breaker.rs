//! # Circuit Breaker Module
//!
//! Circuit breaker for substitution lookups. A recipe with a dozen missing
//! ingredients against a large inventory issues hundreds of sequential remote
//! calls; when the service is down the breaker stops the loop from waiting on
//! each one in turn.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Consecutive-failure circuit breaker
///
/// ```text
/// CLOSED ────failures ≥ threshold────► OPEN
///    ▲                                   │
///    └──────────reset timeout────────────┘
/// ```
///
/// - **CLOSED → OPEN**: when the consecutive failure count reaches `threshold`
/// - **OPEN → CLOSED**: once `reset_after` has elapsed since the last failure;
///   the next call reaches the service again
/// - Any success resets the failure count
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    threshold: u32,
    reset_after: Duration,
}

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stockpit_core::circuit_breaker::CircuitBreaker;
    /// use std::time::Duration;
    ///
    /// let breaker = CircuitBreaker::new(5, Duration::from_secs(60));
    /// assert!(!breaker.is_open());
    /// ```
    pub fn new(threshold: u32, reset_after: Duration) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            threshold,
            reset_after,
        }
    }

    /// Check if the breaker is open (blocking requests).
    ///
    /// Resets to closed automatically once the reset window has elapsed.
    pub fn is_open(&self) -> bool {
        let mut state = self.state.lock();

        if state.failure_count >= self.threshold {
            if let Some(last_time) = state.last_failure_time {
                if last_time.elapsed() < self.reset_after {
                    return true;
                }
                *state = BreakerState::default();
            }
        }
        false
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());
    }

    /// Record a successful call, closing the breaker
    pub fn record_success(&self) {
        *self.state.lock() = BreakerState::default();
    }

    pub fn failure_count(&self) -> u32 {
        self.state.lock().failure_count
    }
}
