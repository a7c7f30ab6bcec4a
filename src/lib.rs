//! Resilient client for calling one external dependency.
//!
//! Composes per-attempt timeouts, retry with exponential backoff and jitter,
//! and a circuit breaker around a pluggable transport and auth provider.

pub mod auth;
pub mod client;
pub mod config;
pub mod observability;
pub mod resilience;
pub mod transport;

pub use client::{ApiResponse, ExecutorError, ParsedBody, RequestOptions, ResilientClient};
pub use config::ClientConfig;
pub use resilience::{BreakerStats, CircuitBreaker, CircuitState};
