//! The attempt loop behind `ResilientClient::execute`.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::error::{AttemptError, ExecutorError, ExecutorResult};
use super::request::{error_body, parse_body, ApiResponse, RequestOptions};
use super::ResilientClient;
use crate::observability::metrics;
use crate::resilience::retries::{classify_status, classify_transport_error, Classification};
use crate::resilience::timeouts::{sleep_cancellable, AttemptScope, Interrupted};
use crate::transport::{TransportError, TransportRequest};

pub(super) const REQUEST_ID_HEADER: &str = "x-request-id";

/// How one attempt ended.
enum AttemptOutcome {
    Success(ApiResponse),
    RetryableFailure(AttemptError),
    TerminalFailure(AttemptError),
    Cancelled,
}

impl ResilientClient {
    /// Issue one logical call.
    ///
    /// Admission is checked before the first attempt and again before every
    /// retry. Credentials are attached once. Retryable failures (429, 5xx,
    /// attempt timeouts) are retried up to `max_retries` times with backoff.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> ExecutorResult<ApiResponse> {
        let request_id = options
            .trace_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let span = tracing::info_span!(
            "execute",
            dependency = %self.inner.name,
            method = %method,
            path = %path,
            request_id = %request_id,
        );

        let started = Instant::now();
        let method_label = method.to_string();
        let result = self
            .execute_inner(method, path, options, request_id)
            .instrument(span)
            .await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.outcome(),
        };
        metrics::record_request(&self.inner.name, &method_label, outcome, started.elapsed());
        result
    }

    async fn execute_inner(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
        request_id: String,
    ) -> ExecutorResult<ApiResponse> {
        let inner = &self.inner;
        let started = Instant::now();
        let url = self.resolve(path, &options.query)?;

        let mut headers = build_headers(&inner.default_headers, &options.headers, &request_id)?;
        let body = match &options.body {
            Some(value) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Some(
                    serde_json::to_vec(value)
                        .map_err(|e| ExecutorError::InvalidRequest(e.to_string()))?,
                )
            }
            None => None,
        };

        let mut permit = inner.breaker.admit().map_err(|e| {
            tracing::warn!(retry_after = ?e.retry_after, state = %e.state, "Circuit open, failing fast");
            ExecutorError::CircuitOpen(e)
        })?;

        if let Err(e) = inner.auth.authenticate(&mut headers).await {
            // Not evidence about the dependency: the permit is released untouched.
            tracing::error!(error = %e, "Authentication failed");
            return Err(ExecutorError::Auth(e));
        }

        let timeout = options.timeout.unwrap_or(inner.default_timeout);
        let cancel = options.cancel.as_ref();
        let mut attempt: u32 = 1;

        loop {
            tracing::debug!(attempt, trial = permit.is_trial(), "Sending attempt");
            let request = TransportRequest {
                method: method.clone(),
                url: url.clone(),
                headers: headers.clone(),
                body: body.clone(),
                timeout,
            };
            let outcome = self.attempt(request, attempt, started, cancel).await;

            let error = match outcome {
                AttemptOutcome::Success(response) => {
                    permit.success();
                    metrics::record_attempt(&inner.name, "success");
                    tracing::debug!(
                        attempt,
                        status = %response.status,
                        elapsed_ms = response.elapsed.as_millis() as u64,
                        "Request succeeded"
                    );
                    return Ok(response);
                }
                AttemptOutcome::Cancelled => {
                    metrics::record_attempt(&inner.name, "cancelled");
                    tracing::info!(attempt, "Request cancelled by caller");
                    return Err(ExecutorError::Cancelled {
                        attempts: attempt,
                        elapsed: started.elapsed(),
                    });
                }
                AttemptOutcome::TerminalFailure(cause) => {
                    permit.failure();
                    metrics::record_attempt(&inner.name, "terminal");
                    tracing::warn!(attempt, error = %cause, "Request failed, not retryable");
                    return Err(ExecutorError::Terminal {
                        attempts: attempt,
                        elapsed: started.elapsed(),
                        cause,
                    });
                }
                AttemptOutcome::RetryableFailure(cause) => {
                    permit.failure();
                    metrics::record_attempt(&inner.name, "retryable");
                    cause
                }
            };

            if attempt > inner.retry.max_retries {
                tracing::warn!(attempts = attempt, error = %error, "Retries exhausted");
                return Err(ExecutorError::RetriesExhausted {
                    attempts: attempt,
                    elapsed: started.elapsed(),
                    cause: error,
                });
            }

            let delay = inner.retry.delay_for(attempt, inner.random.as_ref());
            tracing::info!(attempt, delay = ?delay, error = %error, "Retrying request");
            metrics::record_retry(&inner.name);

            if !sleep_cancellable(delay, cancel).await {
                tracing::info!(attempt, "Request cancelled during backoff");
                return Err(ExecutorError::Cancelled {
                    attempts: attempt,
                    elapsed: started.elapsed(),
                });
            }

            permit = inner.breaker.admit().map_err(|e| {
                tracing::warn!(attempt, state = %e.state, "Circuit opened during backoff, aborting retries");
                ExecutorError::CircuitOpen(e)
            })?;
            attempt += 1;
        }
    }

    /// Run one attempt and classify how it ended.
    async fn attempt(
        &self,
        request: TransportRequest,
        attempt: u32,
        started: Instant,
        cancel: Option<&CancellationToken>,
    ) -> AttemptOutcome {
        let timeout = request.timeout;
        let scope = AttemptScope::new(timeout, cancel);
        let result = scope
            .run(self.inner.transport.send(request, scope.token()))
            .await;
        let caller_cancelled = cancel.is_some_and(|t| t.is_cancelled());

        let response = match result {
            Err(Interrupted::Cancelled) => return AttemptOutcome::Cancelled,
            Err(Interrupted::TimedOut(d)) => {
                return AttemptOutcome::RetryableFailure(AttemptError::TimedOut(d));
            }
            Ok(Err(TransportError::Cancelled)) if caller_cancelled => return AttemptOutcome::Cancelled,
            Ok(Err(TransportError::Cancelled | TransportError::TimedOut)) => {
                return AttemptOutcome::RetryableFailure(AttemptError::TimedOut(timeout));
            }
            Ok(Err(e)) => {
                let class = classify_transport_error(&e);
                let cause = AttemptError::Transport(e);
                return match class {
                    Classification::Retryable => AttemptOutcome::RetryableFailure(cause),
                    Classification::Terminal => AttemptOutcome::TerminalFailure(cause),
                };
            }
            Ok(Ok(response)) => response,
        };

        if !response.status.is_success() {
            let cause = AttemptError::Status {
                status: response.status,
                body: error_body(&response.body),
            };
            return match classify_status(response.status) {
                Classification::Retryable => AttemptOutcome::RetryableFailure(cause),
                Classification::Terminal => AttemptOutcome::TerminalFailure(cause),
            };
        }

        match parse_body(response.status, &response.headers, &response.body) {
            Ok(body) => AttemptOutcome::Success(ApiResponse {
                status: response.status,
                headers: response.headers,
                body,
                attempts: attempt,
                elapsed: started.elapsed(),
            }),
            Err(e) => AttemptOutcome::TerminalFailure(AttemptError::Decode(e)),
        }
    }
}

fn build_headers(
    defaults: &HeaderMap,
    overrides: &HeaderMap,
    request_id: &str,
) -> ExecutorResult<HeaderMap> {
    let mut headers = defaults.clone();
    for name in overrides.keys() {
        headers.remove(name);
        for value in overrides.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    let id = HeaderValue::from_str(request_id)
        .map_err(|_| ExecutorError::InvalidRequest(format!("invalid trace id '{request_id}'")))?;
    headers.insert(REQUEST_ID_HEADER, id);
    Ok(headers)
}
