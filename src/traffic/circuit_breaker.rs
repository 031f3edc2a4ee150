//! # Circuit Breaker
//!
//! Failure-tracking state machine that protects the upstream authentication
//! service from being hammered while it is unhealthy.
//!
//! ## States
//! - **Closed**: all calls permitted. Outcomes are recorded into a
//!   count-based sliding window; when the failure rate over the window meets
//!   the threshold (and the window holds at least the minimum sample count),
//!   the breaker opens.
//! - **Open**: calls are rejected immediately without contacting the
//!   upstream. Once the open duration elapses, the next acquisition moves
//!   the breaker to half-open.
//! - **HalfOpen**: a bounded number of trial calls are admitted. Enough
//!   trial successes close the breaker and reset the window; any trial
//!   failure reopens it and restarts the timer.
//!
//! Rejection is a control signal, not an error: the proxy handler maps it to
//! a `CIRCUIT_OPEN` outcome, distinct from an actual upstream failure.
//!
//! ## Concurrency
//! State and window are guarded together by a per-operation `parking_lot`
//! mutex inside a `DashMap` registry. Half-open trial slots are claimed
//! under that lock at acquisition time, so concurrent callers can never
//! exceed the trial bound.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of recent outcomes kept in the sliding window
    pub sliding_window_size: usize,

    /// Failure rate (percent of the window) at which the breaker opens
    pub failure_rate_threshold: f64,

    /// Minimum outcomes in the window before the rate is considered
    /// statistically meaningful
    pub minimum_samples: usize,

    /// How long to reject calls before probing for recovery
    #[serde(with = "humantime_serde")]
    pub open_duration: Duration,

    /// Number of trial calls admitted while half-open
    pub half_open_trial_calls: u32,

    /// Trial successes required to close the breaker again
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window_size: 10,
            failure_rate_threshold: 50.0,
            minimum_samples: 5,
            open_duration: Duration::from_secs(30),
            half_open_trial_calls: 3,
            half_open_success_threshold: 3,
        }
    }
}

/// Externally observable breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Count-based sliding window of call outcomes
#[derive(Debug)]
struct OutcomeWindow {
    outcomes: VecDeque<bool>,
    capacity: usize,
    failures: usize,
}

impl OutcomeWindow {
    fn new(capacity: usize) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
            failures: 0,
        }
    }

    fn record(&mut self, success: bool) {
        if self.outcomes.len() == self.capacity {
            if let Some(evicted) = self.outcomes.pop_front() {
                if !evicted {
                    self.failures -= 1;
                }
            }
        }
        self.outcomes.push_back(success);
        if !success {
            self.failures += 1;
        }
    }

    fn len(&self) -> usize {
        self.outcomes.len()
    }

    fn failure_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        (self.failures as f64 / self.outcomes.len() as f64) * 100.0
    }
}

/// Internal state machine; one variant active at a time per operation
#[derive(Debug)]
enum BreakerState {
    Closed {
        window: OutcomeWindow,
    },
    Open {
        opened_at: Instant,
    },
    HalfOpen {
        /// Trial slots not yet claimed; decremented at acquisition time
        trial_slots: u32,
        successes: u32,
    },
}

/// Circuit breaker for a single operation
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let window = OutcomeWindow::new(config.sliding_window_size);
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState::Closed { window }),
        }
    }

    /// Check whether a call may proceed to the upstream
    ///
    /// In the open state this also performs the open → half-open transition
    /// once the open duration has elapsed; the transitioning caller claims
    /// the first trial slot.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();

        match &mut *state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.open_duration {
                    info!(operation = %self.name, "circuit breaker probing for recovery");
                    *state = BreakerState::HalfOpen {
                        trial_slots: self.config.half_open_trial_calls.saturating_sub(1),
                        successes: 0,
                    };
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen { trial_slots, .. } => {
                if *trial_slots > 0 {
                    *trial_slots -= 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Whether the window holds enough samples and a failure rate at or
    /// above the threshold
    fn window_is_unhealthy(&self, window: &OutcomeWindow) -> bool {
        window.len() >= self.config.minimum_samples
            && window.failure_rate() >= self.config.failure_rate_threshold
    }

    /// Record a successful call outcome
    ///
    /// A success can still open the breaker: when it completes the minimum
    /// sample count over a window that already meets the failure-rate
    /// threshold, the evaluation fires here just as it does on a failure.
    pub fn record_success(&self) {
        let mut state = self.state.lock();

        match &mut *state {
            BreakerState::Closed { window } => {
                window.record(true);
                if self.window_is_unhealthy(window) {
                    warn!(
                        operation = %self.name,
                        failure_rate = window.failure_rate(),
                        samples = window.len(),
                        "circuit breaker opened"
                    );
                    *state = BreakerState::Open {
                        opened_at: Instant::now(),
                    };
                }
            }
            BreakerState::HalfOpen { successes, .. } => {
                *successes += 1;
                if *successes >= self.config.half_open_success_threshold {
                    info!(operation = %self.name, "circuit breaker closed after successful trials");
                    *state = BreakerState::Closed {
                        window: OutcomeWindow::new(self.config.sliding_window_size),
                    };
                }
            }
            // A late success landing after the breaker reopened carries no
            // information about the current probe; drop it rather than
            // double-count.
            BreakerState::Open { .. } => {}
        }
    }

    /// Record a failed call outcome
    pub fn record_failure(&self) {
        let mut state = self.state.lock();

        match &mut *state {
            BreakerState::Closed { window } => {
                window.record(false);
                if self.window_is_unhealthy(window) {
                    warn!(
                        operation = %self.name,
                        failure_rate = window.failure_rate(),
                        samples = window.len(),
                        "circuit breaker opened"
                    );
                    *state = BreakerState::Open {
                        opened_at: Instant::now(),
                    };
                }
            }
            BreakerState::HalfOpen { .. } => {
                warn!(operation = %self.name, "trial call failed, circuit breaker reopened");
                *state = BreakerState::Open {
                    opened_at: Instant::now(),
                };
            }
            BreakerState::Open { .. } => {}
        }
    }

    /// Current state of the breaker
    pub fn state(&self) -> CircuitState {
        match &*self.state.lock() {
            BreakerState::Closed { .. } => CircuitState::Closed,
            BreakerState::Open { .. } => CircuitState::Open,
            BreakerState::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Registry of circuit breakers, one per protected operation
///
/// Operations are independent: a failing login upstream path never trips the
/// logout breaker.
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Get or create the breaker for an operation
    pub fn get_or_create(&self, operation: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(operation.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(operation, self.config.clone()))
            })
            .clone()
    }

    pub fn try_acquire(&self, operation: &str) -> bool {
        self.get_or_create(operation).try_acquire()
    }

    pub fn record_success(&self, operation: &str) {
        self.get_or_create(operation).record_success();
    }

    pub fn record_failure(&self, operation: &str) {
        self.get_or_create(operation).record_failure();
    }

    pub fn state(&self, operation: &str) -> CircuitState {
        self.get_or_create(operation).state()
    }
}
