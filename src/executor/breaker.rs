//! Circuit breakers keyed by node tag.
//!
//! Nodes sharing a tag (e.g. `"llm"`) share a breaker. The state machine is
//! the usual one: `Closed` opens after N consecutive failures, `Open`
//! half-opens after the recovery timeout and admits a single probe, a
//! half-open success closes the breaker and a half-open failure re-opens
//! it. While the probe is in flight every other acquirer is held back, so a
//! recovering dependency never sees a thundering herd.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

/// Breaker thresholds shared by every tag in a registry.
#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// How long an open breaker waits before allowing a probe.
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

/// Observable breaker state, for diagnostics and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum BreakerState {
    Closed { consecutive_failures: u32 },
    Open { opened_at: Instant },
    HalfOpen,
}

/// Per-tag circuit breakers behind one lock.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: Mutex<FxHashMap<String, BreakerState>>,
}

impl CircuitBreakerRegistry {
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(FxHashMap::default()),
        }
    }

    /// Whether a call keyed by `tag` may proceed right now.
    ///
    /// An open breaker whose recovery timeout has elapsed transitions to
    /// half-open and admits the caller as the single probe. Until that
    /// probe records an outcome, every other acquirer is rejected.
    pub fn try_acquire(&self, tag: &str) -> bool {
        let mut breakers = self.breakers.lock().expect("breaker lock poisoned");
        let state = breakers
            .entry(tag.to_string())
            .or_insert(BreakerState::Closed {
                consecutive_failures: 0,
            });
        match state {
            BreakerState::Closed { .. } => true,
            // The probe slot is taken; hold concurrent acquirers back until
            // its outcome re-opens or closes the breaker.
            BreakerState::HalfOpen => false,
            BreakerState::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    *state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Records a successful call: resets a closed breaker's failure count
    /// and closes a half-open one.
    pub fn record_success(&self, tag: &str) {
        let mut breakers = self.breakers.lock().expect("breaker lock poisoned");
        breakers.insert(
            tag.to_string(),
            BreakerState::Closed {
                consecutive_failures: 0,
            },
        );
    }

    /// Records a failed call: bumps the failure count, opening the breaker
    /// at the threshold; a half-open failure re-opens immediately.
    pub fn record_failure(&self, tag: &str) {
        let mut breakers = self.breakers.lock().expect("breaker lock poisoned");
        let state = breakers
            .entry(tag.to_string())
            .or_insert(BreakerState::Closed {
                consecutive_failures: 0,
            });
        match state {
            BreakerState::Closed {
                consecutive_failures,
            } => {
                *consecutive_failures += 1;
                if *consecutive_failures >= self.config.failure_threshold {
                    *state = BreakerState::Open {
                        opened_at: Instant::now(),
                    };
                }
            }
            BreakerState::HalfOpen => {
                *state = BreakerState::Open {
                    opened_at: Instant::now(),
                };
            }
            BreakerState::Open { .. } => {}
        }
    }

    /// Current state of the breaker for `tag` (`Closed` if never used).
    #[must_use]
    pub fn state(&self, tag: &str) -> CircuitState {
        let breakers = self.breakers.lock().expect("breaker lock poisoned");
        match breakers.get(tag) {
            None | Some(BreakerState::Closed { .. }) => CircuitState::Closed,
            Some(BreakerState::Open { .. }) => CircuitState::Open,
            Some(BreakerState::HalfOpen) => CircuitState::HalfOpen,
        }
    }
}
