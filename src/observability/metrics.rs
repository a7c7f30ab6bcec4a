//! Metrics collection.
//!
//! # Metrics
//! - `client_requests_total` (counter): logical calls by dependency, method, outcome
//! - `client_request_duration_seconds` (histogram): end-to-end call latency
//! - `client_attempts_total` (counter): individual attempts by outcome
//! - `client_retries_total` (counter): backoff waits scheduled
//! - `client_circuit_rejections_total` (counter): calls refused by the breaker
//! - `client_circuit_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `client_health_check` (gauge): 1=healthy, 0=unhealthy

use std::time::Duration;

use crate::resilience::circuit_breaker::CircuitState;

pub fn record_request(dependency: &str, method: &str, outcome: &'static str, elapsed: Duration) {
    metrics::counter!(
        "client_requests_total",
        "dependency" => dependency.to_string(),
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!(
        "client_request_duration_seconds",
        "dependency" => dependency.to_string()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_attempt(dependency: &str, outcome: &'static str) {
    metrics::counter!(
        "client_attempts_total",
        "dependency" => dependency.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_retry(dependency: &str) {
    metrics::counter!("client_retries_total", "dependency" => dependency.to_string()).increment(1);
}

pub fn record_circuit_rejection(dependency: &str) {
    metrics::counter!(
        "client_circuit_rejections_total",
        "dependency" => dependency.to_string()
    )
    .increment(1);
}

pub fn record_circuit_state(dependency: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::Open => 1.0,
        CircuitState::HalfOpen => 2.0,
    };
    metrics::gauge!("client_circuit_state", "dependency" => dependency.to_string()).set(value);
}

pub fn record_health(dependency: &str, healthy: bool) {
    metrics::gauge!("client_health_check", "dependency" => dependency.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
