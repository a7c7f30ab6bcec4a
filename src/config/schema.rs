//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for one
//! dependency client. All types derive Serde traits for deserialization
//! from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for a client bound to one dependency.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the dependency (e.g., "http://inventory:8080/api").
    pub base_url: String,

    /// Default per-attempt timeout in milliseconds.
    pub timeout_ms: u64,

    /// User-Agent sent with every request.
    pub user_agent: String,

    /// Headers added to every outgoing request.
    pub default_headers: BTreeMap<String, String>,

    /// Authentication settings.
    pub auth: AuthConfig,

    /// Retry configuration.
    pub retry: RetryConfig,

    /// Circuit breaker configuration.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Health probe settings.
    pub health: HealthConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_ms: 30_000,
            user_agent: concat!("resilient-client/", env!("CARGO_PKG_VERSION")).to_string(),
            default_headers: BTreeMap::new(),
            auth: AuthConfig::default(),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Default per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// How credentials are attached to outgoing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`.
    Bearer,
    /// Raw token in a custom header (see `header_name`).
    Header,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Enable authentication of outgoing requests.
    pub enabled: bool,

    /// Credential scheme.
    pub scheme: AuthScheme,

    /// Environment variable holding the token. Secrets never live in config files.
    pub token_env: Option<String>,

    /// Header used by the `header` scheme.
    pub header_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scheme: AuthScheme::Bearer,
            token_env: None,
            header_name: "x-api-key".to_string(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (total attempts = max_retries + 1).
    pub max_retries: u32,

    /// Multiplier applied per attempt (must be >= 1).
    pub backoff_factor: f64,

    /// Lower bound for any backoff delay, in milliseconds.
    pub min_delay_ms: u64,

    /// Upper bound for any backoff delay, in milliseconds.
    pub max_delay_ms: u64,

    /// Randomize delays within [0.5, 1.5] of the computed value.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: 2.0,
            min_delay_ms: 100,
            max_delay_ms: 10_000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Enable the breaker. When disabled every call is admitted.
    pub enabled: bool,

    /// Consecutive failures in Closed before the circuit opens.
    pub failure_threshold: u32,

    /// How long Open is held before a trial request is allowed, in milliseconds.
    pub reset_timeout_ms: u64,

    /// Maximum concurrent trial requests while HalfOpen.
    pub half_open_request_limit: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
            half_open_request_limit: 1,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

/// Health probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Path to probe.
    pub path: String,

    /// Path tried when the primary probe fails.
    pub fallback_path: Option<String>,

    /// Probe timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
            fallback_path: Some("/".to_string()),
            timeout_ms: 5_000,
        }
    }
}

impl HealthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
