//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: dependency assumed down, requests fail fast
//! - Half-Open: a bounded number of trial requests probe for recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: reset_timeout elapsed since the last failure (checked on admit)
//! Half-Open → Closed: a trial request succeeds
//! Half-Open → Open: a trial request fails
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency client, never shared across dependencies
//! - All reads and transitions happen under one mutex; no lock is held across
//!   a network call or a backoff sleep
//! - Half-open slots are returned by an RAII permit, so a trial that is
//!   dropped mid-flight (cancelled, panicked) cannot starve the slot

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::clock::{Clock, SystemClock};

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when the breaker refuses a request.
#[derive(Debug, Clone, Error)]
#[error("circuit breaker for '{dependency}' is {state}")]
pub struct CircuitOpenError {
    /// Dependency the breaker protects.
    pub dependency: String,
    /// State at rejection time (Open, or HalfOpen with every trial slot taken).
    pub state: CircuitState,
    /// Time left before a trial request will be admitted, when known.
    pub retry_after: Option<Duration>,
}

/// Read-only snapshot of breaker state.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStats {
    pub enabled: bool,
    pub state: CircuitState,
    pub failure_count: u32,
    #[serde(skip)]
    pub last_failure_time: Option<Instant>,
    /// Milliseconds since the last recorded failure.
    pub last_failure_age_ms: Option<u64>,
    pub half_open_in_flight: u32,
    pub total_trips: u64,
}

#[derive(Debug)]
struct Runtime {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    half_open_in_flight: u32,
    /// Bumped on every entry into HalfOpen; stale permits compare against it.
    generation: u64,
}

impl Runtime {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            half_open_in_flight: 0,
            generation: 0,
        }
    }
}

/// Admission control and failure tracking for one dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    runtime: Mutex<Runtime>,
    total_trips: AtomicU64,
}

impl CircuitBreaker {
    /// Create a breaker using the system clock.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Create a breaker with an injected clock.
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            clock,
            runtime: Mutex::new(Runtime::closed()),
            total_trips: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Runtime> {
        // Every critical section leaves Runtime consistent, so a poisoned lock is still usable.
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask to send one request.
    ///
    /// May move Open → HalfOpen when the reset timeout has elapsed. The returned
    /// permit must be kept until the attempt concludes.
    pub fn admit(self: &Arc<Self>) -> Result<AdmissionPermit, CircuitOpenError> {
        if !self.config.enabled {
            return Ok(AdmissionPermit::unslotted(self));
        }

        let now = self.clock.now();
        let mut rt = self.lock();

        if rt.state == CircuitState::Open {
            let elapsed = rt
                .last_failure
                .map_or(Duration::MAX, |at| now.saturating_duration_since(at));
            let reset_timeout = self.config.reset_timeout();

            if elapsed < reset_timeout {
                metrics::record_circuit_rejection(&self.name);
                return Err(CircuitOpenError {
                    dependency: self.name.clone(),
                    state: CircuitState::Open,
                    retry_after: Some(reset_timeout - elapsed),
                });
            }

            self.transition(&mut rt, CircuitState::HalfOpen);
        }

        if rt.state == CircuitState::Closed {
            return Ok(AdmissionPermit::unslotted(self));
        }

        if rt.half_open_in_flight >= self.config.half_open_request_limit.max(1) {
            metrics::record_circuit_rejection(&self.name);
            return Err(CircuitOpenError {
                dependency: self.name.clone(),
                state: CircuitState::HalfOpen,
                retry_after: None,
            });
        }
        rt.half_open_in_flight += 1;
        tracing::debug!(
            dependency = %self.name,
            in_flight = rt.half_open_in_flight,
            "Admitted half-open trial request"
        );
        Ok(AdmissionPermit {
            breaker: Arc::clone(self),
            half_open_generation: Some(rt.generation),
        })
    }

    /// Record a successful request.
    pub fn record_success(&self) {
        if !self.config.enabled {
            return;
        }
        let mut rt = self.lock();
        match rt.state {
            CircuitState::HalfOpen => {
                tracing::info!(dependency = %self.name, "Circuit breaker closing - dependency recovered");
                self.transition(&mut rt, CircuitState::Closed);
            }
            CircuitState::Closed => rt.failure_count = 0,
            CircuitState::Open => {
                tracing::debug!(dependency = %self.name, "Ignoring success recorded while open");
            }
        }
    }

    /// Record a failed request.
    pub fn record_failure(&self) {
        if !self.config.enabled {
            return;
        }
        let now = self.clock.now();
        let mut rt = self.lock();
        rt.last_failure = Some(now);

        match rt.state {
            CircuitState::HalfOpen => {
                tracing::warn!(dependency = %self.name, "Circuit breaker re-opening - trial request failed");
                self.transition(&mut rt, CircuitState::Open);
            }
            CircuitState::Closed => {
                rt.failure_count = rt.failure_count.saturating_add(1);
                if rt.failure_count >= self.config.failure_threshold.max(1) {
                    tracing::warn!(
                        dependency = %self.name,
                        failures = rt.failure_count,
                        reset_timeout_ms = self.config.reset_timeout_ms,
                        "Circuit breaker opening - too many failures"
                    );
                    self.transition(&mut rt, CircuitState::Open);
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Force the breaker back to Closed with zeroed counters.
    pub fn reset(&self) {
        let mut rt = self.lock();
        if rt.state != CircuitState::Closed {
            tracing::info!(dependency = %self.name, previous = %rt.state, "Circuit breaker reset manually");
        }
        self.transition(&mut rt, CircuitState::Closed);
    }

    /// Current state without triggering any transition.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Snapshot for introspection. No side effects.
    pub fn stats(&self) -> BreakerStats {
        let now = self.clock.now();
        let rt = self.lock();
        BreakerStats {
            enabled: self.config.enabled,
            state: rt.state,
            failure_count: rt.failure_count,
            last_failure_time: rt.last_failure,
            last_failure_age_ms: rt
                .last_failure
                .map(|at| now.saturating_duration_since(at).as_millis() as u64),
            half_open_in_flight: rt.half_open_in_flight,
            total_trips: self.total_trips.load(Ordering::Relaxed),
        }
    }

    fn transition(&self, rt: &mut Runtime, to: CircuitState) {
        let from = rt.state;
        rt.state = to;
        match to {
            CircuitState::Closed => {
                let generation = rt.generation;
                *rt = Runtime::closed();
                rt.generation = generation;
            }
            CircuitState::Open => {
                rt.half_open_in_flight = 0;
                self.total_trips.fetch_add(1, Ordering::Relaxed);
            }
            CircuitState::HalfOpen => {
                rt.half_open_in_flight = 0;
                rt.generation = rt.generation.wrapping_add(1);
            }
        }
        if from != to {
            tracing::info!(dependency = %self.name, from = %from, to = %to, "Circuit breaker state change");
            metrics::record_circuit_state(&self.name, to);
        }
    }

    fn release_half_open_slot(&self, generation: u64) {
        let mut rt = self.lock();
        if rt.state == CircuitState::HalfOpen && rt.generation == generation {
            rt.half_open_in_flight = rt.half_open_in_flight.saturating_sub(1);
        }
    }
}

/// Proof of admission for one attempt.
///
/// Dropping the permit returns any half-open trial slot it holds. Reporting
/// the outcome through [`AdmissionPermit::success`] or
/// [`AdmissionPermit::failure`] also releases it.
#[derive(Debug)]
#[must_use = "dropping the permit immediately releases the half-open slot"]
pub struct AdmissionPermit {
    breaker: Arc<CircuitBreaker>,
    half_open_generation: Option<u64>,
}

impl AdmissionPermit {
    fn unslotted(breaker: &Arc<CircuitBreaker>) -> Self {
        Self {
            breaker: Arc::clone(breaker),
            half_open_generation: None,
        }
    }

    /// Whether this permit holds a half-open trial slot.
    pub fn is_trial(&self) -> bool {
        self.half_open_generation.is_some()
    }

    pub fn success(self) {
        self.breaker.record_success();
    }

    pub fn failure(self) {
        self.breaker.record_failure();
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        if let Some(generation) = self.half_open_generation.take() {
            self.breaker.release_half_open_slot(generation);
        }
    }
}
