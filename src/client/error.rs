//! Client error taxonomy.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::AuthError;
use crate::config::ValidationError;
use crate::resilience::CircuitOpenError;
use crate::transport::TransportError;

/// Why a single attempt failed.
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    /// The dependency answered with a non-success status.
    #[error("dependency returned {status}")]
    Status { status: StatusCode, body: String },

    /// The attempt exceeded its deadline.
    #[error("attempt timed out after {0:?}")]
    TimedOut(Duration),

    /// The request never produced a response.
    #[error(transparent)]
    Transport(TransportError),

    /// A success response whose body could not be parsed.
    #[error("malformed response body: {0}")]
    Decode(String),
}

/// Errors surfaced by [`ResilientClient::execute`](super::ResilientClient::execute).
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The breaker refused the call. Never retried here; the caller decides.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// Credentials could not be attached. Not evidence of dependency health.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Every allowed attempt failed with a retryable error.
    #[error("retries exhausted after {attempts} attempts in {elapsed:?}: {cause}")]
    RetriesExhausted {
        attempts: u32,
        elapsed: Duration,
        #[source]
        cause: AttemptError,
    },

    /// An attempt failed in a way that is not worth retrying.
    #[error("request failed after {attempts} attempt(s) in {elapsed:?}: {cause}")]
    Terminal {
        attempts: u32,
        elapsed: Duration,
        #[source]
        cause: AttemptError,
    },

    /// The caller cancelled the call.
    #[error("request cancelled after {attempts} attempt(s) in {elapsed:?}")]
    Cancelled { attempts: u32, elapsed: Duration },

    /// The request could not be built (bad path, header or body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for client calls.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

impl ExecutorError {
    /// Status code of the final failed response, if there was one.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self.attempt_error() {
            Some(AttemptError::Status { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Body of the final failed response, if there was one.
    pub fn response_body(&self) -> Option<&str> {
        match self.attempt_error() {
            Some(AttemptError::Status { body, .. }) => Some(body),
            _ => None,
        }
    }

    /// Underlying attempt failure for exhausted and terminal errors.
    pub fn attempt_error(&self) -> Option<&AttemptError> {
        match self {
            ExecutorError::RetriesExhausted { cause, .. } | ExecutorError::Terminal { cause, .. } => {
                Some(cause)
            }
            _ => None,
        }
    }

    /// Attempts made before the error was raised.
    pub fn attempts(&self) -> u32 {
        match self {
            ExecutorError::RetriesExhausted { attempts, .. }
            | ExecutorError::Terminal { attempts, .. }
            | ExecutorError::Cancelled { attempts, .. } => *attempts,
            _ => 0,
        }
    }

    /// Whether the dependency is presumed unhealthy and the caller should degrade.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ExecutorError::CircuitOpen(_) | ExecutorError::RetriesExhausted { .. }
        )
    }

    /// Short label for logs, metrics and CLI output.
    pub fn outcome(&self) -> &'static str {
        match self {
            ExecutorError::CircuitOpen(_) => "circuit_open",
            ExecutorError::Auth(_) => "auth_error",
            ExecutorError::RetriesExhausted { .. } => "exhausted",
            ExecutorError::Terminal { .. } => "terminal",
            ExecutorError::Cancelled { .. } => "cancelled",
            ExecutorError::InvalidRequest(_) => "invalid",
        }
    }
}

/// Errors raised while building a client.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid configuration: {0:?}")]
    Config(Vec<ValidationError>),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid default header '{0}'")]
    InvalidHeader(String),
}
