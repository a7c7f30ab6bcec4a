//! Transport abstraction.
//!
//! # Responsibilities
//! - Define the single call the executor makes per attempt
//! - Report transport failures as typed errors the retry layer can classify
//!
//! # Design Decisions
//! - The transport knows nothing about retries, breakers or auth
//! - Every send receives the attempt's cancellation token and must stop
//!   promptly when it fires
//! - Bodies are fully buffered; the executor needs the whole body to classify

pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

pub use http::HttpTransport;

/// One outbound request, fully resolved.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

/// Raw response from the dependency.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Failures below the HTTP status layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection refused, reset, DNS failure.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The transport's own deadline elapsed.
    #[error("request timed out")]
    TimedOut,

    /// The request could not be built or sent.
    #[error("request failed: {0}")]
    Request(String),

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The cancellation token fired before completion.
    #[error("request cancelled")]
    Cancelled,
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Sends one request to the dependency.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
    ) -> TransportResult<TransportResponse>;
}
