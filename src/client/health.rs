//! Best-effort health probing.
//!
//! # Responsibilities
//! - One GET with a short deadline against a health path
//! - Optionally try a fallback path before declaring the dependency unhealthy
//!
//! # Design Decisions
//! - Bypasses the circuit breaker and retry policy entirely: a probe must
//!   observe current reachability, never be blocked by or feed past degradation
//! - Auth failure means unhealthy
//! - Only 2xx counts as healthy

use std::time::Duration;

use reqwest::header::HeaderValue;
use reqwest::Method;
use uuid::Uuid;

use super::executor::REQUEST_ID_HEADER;
use super::ResilientClient;
use crate::observability::metrics;
use crate::resilience::timeouts::AttemptScope;
use crate::transport::TransportRequest;

impl ResilientClient {
    /// Probe `path`, falling back to the configured fallback path on failure.
    pub async fn health_check(&self, path: &str, timeout: Duration) -> bool {
        let mut healthy = self.probe(path, timeout).await;

        if !healthy {
            if let Some(fallback) = self.inner.health.fallback_path.as_deref() {
                if fallback != path {
                    tracing::debug!(dependency = %self.inner.name, path = %fallback, "Trying fallback health path");
                    healthy = self.probe(fallback, timeout).await;
                }
            }
        }

        metrics::record_health(&self.inner.name, healthy);
        if healthy {
            tracing::debug!(dependency = %self.inner.name, "Health check passed");
        } else {
            tracing::warn!(dependency = %self.inner.name, "Health check failed");
        }
        healthy
    }

    /// Probe using the path and timeout from `HealthConfig`.
    pub async fn health_check_default(&self) -> bool {
        let path = self.inner.health.path.clone();
        self.health_check(&path, self.inner.health.timeout()).await
    }

    async fn probe(&self, path: &str, timeout: Duration) -> bool {
        let url = match self.resolve(path, &[]) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Failed to build health check request");
                return false;
            }
        };

        let mut headers = self.inner.default_headers.clone();
        if let Ok(id) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            headers.insert(REQUEST_ID_HEADER, id);
        }
        if let Err(e) = self.inner.auth.authenticate(&mut headers).await {
            tracing::warn!(path = %path, error = %e, "Health check failed: authentication error");
            return false;
        }

        let request = TransportRequest {
            method: Method::GET,
            url,
            headers,
            body: None,
            timeout,
        };
        let scope = AttemptScope::new(timeout, None);
        match scope.run(self.inner.transport.send(request, scope.token())).await {
            Ok(Ok(response)) => {
                let success = response.status.is_success();
                if !success {
                    tracing::warn!(path = %path, status = %response.status, "Health check failed: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::warn!(path = %path, error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::warn!(path = %path, "Health check failed: timeout");
                false
            }
        }
    }
}
