//! Per-call request options and parsed responses.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Longest error body kept for diagnostics.
pub(crate) const MAX_ERROR_BODY_BYTES: usize = 4 * 1024;

/// Caller-supplied options for one call. Immutable once the call starts.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    /// Overrides the client's default per-attempt timeout.
    pub timeout: Option<Duration>,
    /// Cancels the whole call, including any backoff wait.
    pub cancel: Option<CancellationToken>,
    /// Sent as `x-request-id`; a UUID is generated when absent.
    pub trace_id: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn trace_id(mut self, id: impl Into<String>) -> Self {
        self.trace_id = Some(id.into());
        self
    }
}

/// Decoded body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    /// 204/205 or a zero-length body.
    Empty,
    Json(Value),
    /// Non-JSON content types.
    Text(String),
}

impl ParsedBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, ParsedBody::Empty)
    }

    /// Decode a JSON body into `T`. Empty bodies yield `None`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<Option<T>, serde_json::Error> {
        match self {
            ParsedBody::Empty => Ok(None),
            ParsedBody::Json(value) => serde_json::from_value(value).map(Some),
            ParsedBody::Text(text) => serde_json::from_str(&text).map(Some),
        }
    }
}

/// A successful response plus call diagnostics.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ParsedBody,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Parse a success body according to status and content type.
pub(crate) fn parse_body(
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<ParsedBody, String> {
    if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT || body.is_empty() {
        return Ok(ParsedBody::Empty);
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_ascii_lowercase);

    match content_type {
        Some(ct) if !ct.contains("json") => String::from_utf8(body.to_vec())
            .map(ParsedBody::Text)
            .map_err(|e| e.to_string()),
        _ => serde_json::from_slice(body)
            .map(ParsedBody::Json)
            .map_err(|e| e.to_string()),
    }
}

/// Lossy, length-capped body text for error reports.
pub(crate) fn error_body(body: &[u8]) -> String {
    let capped = &body[..body.len().min(MAX_ERROR_BODY_BYTES)];
    String::from_utf8_lossy(capped).into_owned()
}
