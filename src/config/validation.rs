//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, thresholds >= 1, factor >= 1)
//! - Check the base URL is an absolute http(s) URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::ClientConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("base_url '{0}' is not a valid absolute URL")]
    InvalidBaseUrl(String),

    #[error("base_url scheme '{0}' is not supported (expected http or https)")]
    UnsupportedScheme(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("retry.backoff_factor must be a finite number >= 1")]
    BackoffFactor,

    #[error("retry.min_delay_ms ({min}) exceeds retry.max_delay_ms ({max})")]
    DelayBounds { min: u64, max: u64 },

    #[error("auth is enabled but auth.token_env is not set")]
    MissingTokenSource,
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.base_url) {
        Ok(url) if url.scheme() != "http" && url.scheme() != "https" => {
            errors.push(ValidationError::UnsupportedScheme(url.scheme().to_string()));
        }
        Ok(_) => {}
        Err(_) => errors.push(ValidationError::InvalidBaseUrl(config.base_url.clone())),
    }

    if config.timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "timeout_ms" });
    }

    let retry = &config.retry;
    if !retry.backoff_factor.is_finite() || retry.backoff_factor < 1.0 {
        errors.push(ValidationError::BackoffFactor);
    }
    if retry.min_delay_ms > retry.max_delay_ms {
        errors.push(ValidationError::DelayBounds {
            min: retry.min_delay_ms,
            max: retry.max_delay_ms,
        });
    }

    let breaker = &config.circuit_breaker;
    if breaker.enabled {
        if breaker.failure_threshold == 0 {
            errors.push(ValidationError::Zero { field: "circuit_breaker.failure_threshold" });
        }
        if breaker.half_open_request_limit == 0 {
            errors.push(ValidationError::Zero { field: "circuit_breaker.half_open_request_limit" });
        }
    }

    if config.health.timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "health.timeout_ms" });
    }

    if config.auth.enabled && config.auth.token_env.as_deref().map_or(true, str::is_empty) {
        errors.push(ValidationError::MissingTokenSource);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
