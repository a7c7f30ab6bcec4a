//! Retry classification.
//!
//! # Responsibilities
//! - Decide whether a failed attempt is worth repeating
//!
//! # Design Decisions
//! - 429 and 5xx are retryable; every other non-2xx is terminal
//! - Connection, DNS and protocol errors are terminal: retrying a refused
//!   connection inside one call rarely helps and the breaker tracks the trend
//! - An attempt that hit its own timeout is retryable; a call cancelled by the
//!   caller is terminal and ends the loop
//! - A malformed body from a 2xx response is terminal

use reqwest::StatusCode;

use crate::transport::TransportError;

/// Outcome class of one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Retryable,
    Terminal,
}

impl Classification {
    pub fn is_retryable(self) -> bool {
        self == Classification::Retryable
    }
}

/// Classify a non-success HTTP status.
pub fn classify_status(status: StatusCode) -> Classification {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Classification::Retryable
    } else {
        Classification::Terminal
    }
}

/// Classify a transport-level error.
pub fn classify_transport_error(error: &TransportError) -> Classification {
    match error {
        TransportError::TimedOut => Classification::Retryable,
        TransportError::Connect(_)
        | TransportError::Request(_)
        | TransportError::Body(_)
        | TransportError::Cancelled => Classification::Terminal,
    }
}
