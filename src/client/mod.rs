//! Resilient client for one dependency.
//!
//! # Data Flow
//! ```text
//! execute(method, path, options)
//!     → circuit breaker admission (fast-fail when open)
//!     → AuthProvider::authenticate (once per call)
//!     → attempt loop:
//!         attempt deadline + caller cancellation
//!         → Transport::send
//!         → classify (success / retryable / terminal)
//!         → breaker feedback
//!         → backoff wait, breaker re-check, next attempt
//!     → ApiResponse | ExecutorError
//!
//! health_check(path, timeout)
//!     → auth + single transport call, bypassing breaker and retries
//! ```
//!
//! # Design Decisions
//! - One client owns one breaker; clones share it
//! - Configuration is copied in at build time and never mutated
//! - Every non-success path ends in a typed `ExecutorError`

pub mod error;
mod executor;
mod health;
pub mod request;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::auth::{self, AuthProvider};
use crate::config::{validate_config, ClientConfig, HealthConfig, ValidationError};
use crate::resilience::{
    BreakerStats, CircuitBreaker, Clock, RandomSource, RetryPolicy, SystemClock, ThreadRandom,
};
use crate::transport::{HttpTransport, Transport};

pub use error::{AttemptError, ClientBuildError, ExecutorError, ExecutorResult};
pub use request::{ApiResponse, ParsedBody, RequestOptions};

struct ClientInner {
    name: String,
    base_url: Url,
    default_timeout: Duration,
    default_headers: HeaderMap,
    retry: RetryPolicy,
    health: HealthConfig,
    breaker: Arc<CircuitBreaker>,
    transport: Arc<dyn Transport>,
    auth: Arc<dyn AuthProvider>,
    random: Arc<dyn RandomSource>,
}

/// Client for one logical dependency (one base URL).
#[derive(Clone)]
pub struct ResilientClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("dependency", &self.inner.name)
            .field("base_url", &self.inner.base_url.as_str())
            .field("timeout", &self.inner.default_timeout)
            .field("retry", &self.inner.retry)
            .finish()
    }
}

impl ResilientClient {
    /// Build a client with the reqwest transport and config-driven auth.
    pub fn new(config: ClientConfig) -> Result<Self, ClientBuildError> {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder {
            config,
            name: None,
            transport: None,
            auth: None,
            clock: None,
            random: None,
        }
    }

    /// Dependency name used in logs and metrics.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The breaker guarding this dependency.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.inner.breaker
    }

    /// Read-only breaker snapshot.
    pub fn breaker_stats(&self) -> BreakerStats {
        self.inner.breaker.stats()
    }

    pub async fn get(&self, path: &str) -> ExecutorResult<ApiResponse> {
        self.execute(Method::GET, path, RequestOptions::default()).await
    }

    pub async fn post(&self, path: &str, body: Value) -> ExecutorResult<ApiResponse> {
        self.execute(Method::POST, path, RequestOptions::new().json(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> ExecutorResult<ApiResponse> {
        self.execute(Method::PUT, path, RequestOptions::new().json(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> ExecutorResult<ApiResponse> {
        self.execute(Method::PATCH, path, RequestOptions::new().json(body)).await
    }

    pub async fn delete(&self, path: &str) -> ExecutorResult<ApiResponse> {
        self.execute(Method::DELETE, path, RequestOptions::default()).await
    }

    /// Resolve `path` against the base URL and append query pairs.
    fn resolve(&self, path: &str, query: &[(String, String)]) -> ExecutorResult<Url> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let joined = if path.is_empty() {
            base.to_string()
        } else if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };

        let mut url = Url::parse(&joined)
            .map_err(|e| ExecutorError::InvalidRequest(format!("cannot resolve '{path}': {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}

/// Builder for [`ResilientClient`] with injectable collaborators.
pub struct ClientBuilder {
    config: ClientConfig,
    name: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    auth: Option<Arc<dyn AuthProvider>>,
    clock: Option<Arc<dyn Clock>>,
    random: Option<Arc<dyn RandomSource>>,
}

impl ClientBuilder {
    /// Override the dependency name (defaults to the base URL host).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use this provider instead of the one described by `AuthConfig`.
    pub fn auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    pub fn build(self) -> Result<ResilientClient, ClientBuildError> {
        let config = self.config;
        if self.auth.is_some() {
            // An injected provider replaces the env-based token source.
            let mut checked = config.clone();
            checked.auth.enabled = false;
            validate_config(&checked).map_err(ClientBuildError::Config)?;
        } else {
            validate_config(&config).map_err(ClientBuildError::Config)?;
        }

        let base_url = Url::parse(&config.base_url).map_err(|_| {
            ClientBuildError::Config(vec![ValidationError::InvalidBaseUrl(config.base_url.clone())])
        })?;
        let name = self
            .name
            .or_else(|| base_url.host_str().map(str::to_string))
            .unwrap_or_else(|| "dependency".to_string());

        let mut default_headers = HeaderMap::new();
        for (key, value) in &config.default_headers {
            let header = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| ClientBuildError::InvalidHeader(key.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ClientBuildError::InvalidHeader(key.clone()))?;
            default_headers.insert(header, value);
        }

        let transport = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(&config.user_agent)?),
        };
        let auth = match self.auth {
            Some(a) => a,
            None => auth::from_config(&config.auth)?,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let random = self.random.unwrap_or_else(|| Arc::new(ThreadRandom));

        let breaker = Arc::new(CircuitBreaker::with_clock(
            name.clone(),
            config.circuit_breaker.clone(),
            clock,
        ));

        tracing::info!(
            dependency = %name,
            base_url = %base_url,
            timeout_ms = config.timeout_ms,
            max_retries = config.retry.max_retries,
            breaker_enabled = config.circuit_breaker.enabled,
            "Resilient client initialized"
        );

        Ok(ResilientClient {
            inner: Arc::new(ClientInner {
                name,
                base_url,
                default_timeout: config.timeout(),
                default_headers,
                retry: RetryPolicy::from(&config.retry),
                health: config.health.clone(),
                breaker,
                transport,
                auth,
                random,
            }),
        })
    }
}
