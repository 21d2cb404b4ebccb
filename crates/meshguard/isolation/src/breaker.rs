//! Per-peer circuit breaker.
//!
//! Tracks failed interactions with a peer independently of its isolation
//! level and gates requests once failures pile up. One breaker per peer,
//! created lazily, never shared between peers.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use meshguard_types::PeerId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::CircuitBreakerConfig;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Requests flow normally.
    Closed,

    /// Requests are blocked until the recovery timeout elapses.
    Open,

    /// Probing whether the peer has recovered.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Circuit breaker for a single peer.
///
/// All state lives behind one mutex so a transition is never observable
/// as two partial updates. The Open to HalfOpen transition is pull-based:
/// it happens inside [`CircuitBreaker::allow_request`] once the recovery
/// timeout has elapsed, no timer involved.
pub struct CircuitBreaker {
    /// Peer this breaker is for.
    peer_id: PeerId,

    /// Configuration.
    config: CircuitBreakerConfig,

    /// Time source.
    clock: Arc<dyn Clock>,

    /// Mutable state.
    inner: Mutex<BreakerInner>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Consecutive-ish failure count while closed; successes decay it by
    /// one rather than resetting it, so one good call does not erase a
    /// streak of bad ones.
    failure_count: u32,
    /// Consecutive successes while half-open.
    half_open_successes: u32,
    last_failure_at: Option<DateTime<Utc>>,
}

impl CircuitBreaker {
    /// Create a new breaker for a peer.
    pub fn new(peer_id: PeerId, config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            peer_id,
            config,
            clock,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                half_open_successes: 0,
                last_failure_at: None,
            }),
        }
    }

    /// Peer this breaker guards.
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// Current state. Read-only; the lazy Open to HalfOpen transition
    /// only happens in [`CircuitBreaker::allow_request`].
    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    /// Current failure count.
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().unwrap().failure_count
    }

    /// Check whether a request to this peer should go out.
    ///
    /// While open, returns true only once the recovery timeout has passed
    /// since the last failure, transitioning to half-open on that first
    /// true.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let timeout_elapsed = inner.last_failure_at.map_or(true, |last| {
                    self.clock
                        .now()
                        .signed_duration_since(last)
                        .to_std()
                        .map(|elapsed| elapsed >= self.config.recovery_timeout)
                        .unwrap_or(false)
                });

                if timeout_elapsed {
                    info!(
                        peer_id = %self.peer_id,
                        "circuit breaker half-open after recovery timeout"
                    );
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful interaction with the peer.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = inner.failure_count.saturating_sub(1);
            }
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.half_open_requests {
                    info!(
                        peer_id = %self.peer_id,
                        successes = inner.half_open_successes,
                        "circuit breaker closing after recovery"
                    );
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.half_open_successes = 0;
                    inner.last_failure_at = None;
                }
            }
            CircuitState::Open => {
                debug!(peer_id = %self.peer_id, "success recorded while circuit open");
            }
        }
    }

    /// Record a failed interaction with the peer.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.last_failure_at = Some(self.clock.now());

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    warn!(
                        peer_id = %self.peer_id,
                        failures = inner.failure_count,
                        "circuit breaker opening"
                    );
                    inner.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                warn!(
                    peer_id = %self.peer_id,
                    "circuit breaker re-opening after half-open failure"
                );
                inner.state = CircuitState::Open;
                inner.half_open_successes = 0;
            }
            CircuitState::Open => {
                // Already open; the refreshed failure time pushes the
                // recovery window out.
            }
        }
    }

    /// Force the breaker back to closed with all counters zeroed.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != CircuitState::Closed {
            info!(peer_id = %self.peer_id, old_state = %inner.state, "circuit breaker reset");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.half_open_successes = 0;
        inner.last_failure_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            half_open_requests: 2,
        }
    }

    fn breaker() -> (Arc<ManualClock>, CircuitBreaker) {
        let clock = Arc::new(ManualClock::starting_now());
        let breaker = CircuitBreaker::new(PeerId::new("p1"), test_config(), clock.clone());
        (clock, breaker)
    }

    #[test]
    fn test_closed_to_open_at_threshold() {
        let (_clock, breaker) = breaker();

        assert!(breaker.allow_request());
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_request());
    }

    #[test]
    fn test_success_decays_rather_than_resets() {
        let (_clock, breaker) = breaker();

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.failure_count(), 1);

        // One good call did not erase the streak: one more failure brings
        // the count back to two, the next one opens.
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_success_floor_is_zero() {
        let (_clock, breaker) = breaker();
        breaker.record_success();
        breaker.record_success();
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn test_open_to_half_open_after_timeout() {
        let (clock, breaker) = breaker();
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(29));
        assert!(!breaker.allow_request());
        assert_eq!(breaker.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(1));
        assert!(breaker.allow_request());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_successes_close() {
        let (clock, breaker) = breaker();
        for _ in 0..3 {
            breaker.record_failure();
        }
        clock.advance(Duration::from_secs(30));
        assert!(breaker.allow_request());

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let (clock, breaker) = breaker();
        for _ in 0..3 {
            breaker.record_failure();
        }
        clock.advance(Duration::from_secs(30));
        assert!(breaker.allow_request());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        // The new failure restarted the recovery window.
        clock.advance(Duration::from_secs(29));
        assert!(!breaker.allow_request());
        clock.advance(Duration::from_secs(1));
        assert!(breaker.allow_request());
    }

    #[test]
    fn test_reset_closes_and_zeroes() {
        let (_clock, breaker) = breaker();
        for _ in 0..3 {
            breaker.record_failure();
        }
        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
        assert!(breaker.allow_request());
    }
}
