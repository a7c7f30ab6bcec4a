//! Outgoing request authentication.
//!
//! # Responsibilities
//! - Attach credentials to the headers of each outgoing call
//! - Build the configured provider from `AuthConfig`
//!
//! # Security Constraints
//! - Tokens are read ONLY from environment variables
//! - Never log token values
//!
//! # Design Decisions
//! - Providers run once per call, not per attempt
//! - Auth failures are fatal and never counted against the dependency

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use thiserror::Error;

use crate::config::{AuthConfig, AuthScheme};

/// Errors raised while authenticating a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No credential is available.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// The credential cannot be encoded into a header.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// A custom provider failed to obtain or refresh credentials.
    #[error("auth provider failed: {0}")]
    Provider(String),
}

/// Supplies or refreshes credentials for outgoing requests.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, headers: &mut HeaderMap) -> Result<(), AuthError>;
}

/// Leaves requests untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuth;

#[async_trait]
impl AuthProvider for NoAuth {
    async fn authenticate(&self, _headers: &mut HeaderMap) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Static token sent in a header.
#[derive(Clone)]
pub struct TokenAuth {
    header: HeaderName,
    value: HeaderValue,
}

impl TokenAuth {
    /// `Authorization: Bearer <token>`.
    pub fn bearer(token: &str) -> Result<Self, AuthError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| AuthError::InvalidCredential("token contains invalid characters".into()))?;
        value.set_sensitive(true);
        Ok(Self {
            header: AUTHORIZATION,
            value,
        })
    }

    /// `<header>: <token>`.
    pub fn header(name: &str, token: &str) -> Result<Self, AuthError> {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| AuthError::InvalidCredential(format!("invalid header name '{name}'")))?;
        let mut value = HeaderValue::from_str(token)
            .map_err(|_| AuthError::InvalidCredential("token contains invalid characters".into()))?;
        value.set_sensitive(true);
        Ok(Self { header, value })
    }
}

impl fmt::Debug for TokenAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuth")
            .field("header", &self.header)
            .field("value", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl AuthProvider for TokenAuth {
    async fn authenticate(&self, headers: &mut HeaderMap) -> Result<(), AuthError> {
        headers.insert(self.header.clone(), self.value.clone());
        Ok(())
    }
}

/// Build the provider described by `config`.
pub fn from_config(config: &AuthConfig) -> Result<Arc<dyn AuthProvider>, AuthError> {
    if !config.enabled {
        return Ok(Arc::new(NoAuth));
    }

    let var = config
        .token_env
        .as_deref()
        .ok_or_else(|| AuthError::MissingCredential("auth.token_env is not set".into()))?;
    let token = std::env::var(var)
        .map_err(|_| AuthError::MissingCredential(format!("environment variable {var} is not set")))?;

    let provider = match config.scheme {
        AuthScheme::Bearer => TokenAuth::bearer(&token)?,
        AuthScheme::Header => TokenAuth::header(&config.header_name, &token)?,
    };
    tracing::debug!(scheme = ?config.scheme, token_env = %var, "Authentication enabled");
    Ok(Arc::new(provider))
}
