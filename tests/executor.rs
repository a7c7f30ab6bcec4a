//! Behavioural tests for the attempt loop, driven by a scripted transport
//! under paused Tokio time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use resilient_client::auth::{AuthError, AuthProvider};
use resilient_client::client::{AttemptError, ExecutorError, ParsedBody, RequestOptions};
use resilient_client::resilience::{FixedRandom, ManualClock};
use resilient_client::transport::{
    Transport, TransportError, TransportRequest, TransportResponse, TransportResult,
};
use resilient_client::{CircuitState, ClientConfig, ResilientClient};

#[derive(Debug, Clone)]
enum Step {
    Json(u16, &'static str),
    Text(u16, &'static str),
    Fail(TransportError),
    /// Never answers; waits for the attempt token.
    Hang,
    /// Answers after a delay.
    Slow(Duration, u16),
}

struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicU32,
    seen: Mutex<Vec<(Instant, TransportRequest)>>,
}

impl ScriptedTransport {
    fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Self::with_fallback(steps, Step::Json(200, "{}"))
    }

    fn with_fallback(steps: impl IntoIterator<Item = Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into_iter().collect()),
            fallback,
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn seen(&self) -> Vec<(Instant, TransportRequest)> {
        self.seen.lock().unwrap().clone()
    }
}

fn respond(status: u16, content_type: &'static str, body: &str) -> TransportResult<TransportResponse> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    Ok(TransportResponse {
        status: StatusCode::from_u16(status).unwrap(),
        headers,
        body: body.as_bytes().to_vec(),
    })
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
    ) -> TransportResult<TransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((Instant::now(), request));
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Json(status, body) => respond(status, "application/json", body),
            Step::Text(status, body) => respond(status, "text/plain", body),
            Step::Fail(e) => Err(e),
            Step::Hang => {
                cancel.cancelled().await;
                Err(TransportError::Cancelled)
            }
            Step::Slow(delay, status) => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(TransportError::Cancelled),
                    _ = tokio::time::sleep(delay) => respond(status, "application/json", "{}"),
                }
            }
        }
    }
}

/// Counts calls and either attaches a bearer token or fails.
struct CountingAuth {
    calls: AtomicU32,
    fail: bool,
}

impl CountingAuth {
    fn ok() -> Arc<Self> {
        Arc::new(Self { calls: AtomicU32::new(0), fail: false })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self { calls: AtomicU32::new(0), fail: true })
    }
}

#[async_trait]
impl AuthProvider for CountingAuth {
    async fn authenticate(&self, headers: &mut HeaderMap) -> Result<(), AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AuthError::Provider("token endpoint unreachable".into()));
        }
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer test-token"));
        Ok(())
    }
}

fn config(max_retries: u32, failure_threshold: u32) -> ClientConfig {
    let mut config = ClientConfig {
        base_url: "http://inventory.test".into(),
        timeout_ms: 1_000,
        ..ClientConfig::default()
    };
    config.retry.max_retries = max_retries;
    config.retry.min_delay_ms = 100;
    config.retry.max_delay_ms = 10_000;
    config.retry.backoff_factor = 2.0;
    config.retry.jitter = false;
    config.circuit_breaker.failure_threshold = failure_threshold;
    config.circuit_breaker.reset_timeout_ms = 30_000;
    config
}

fn scripted_client(
    config: ClientConfig,
    transport: Arc<ScriptedTransport>,
    clock: Arc<ManualClock>,
) -> ResilientClient {
    ResilientClient::builder(config)
        .transport(transport)
        .clock(clock)
        .random(Arc::new(FixedRandom(0.5)))
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_makes_exactly_retries_plus_one_attempts() {
    let transport = ScriptedTransport::with_fallback([], Step::Text(503, "overloaded"));
    let client = scripted_client(config(3, 10), transport.clone(), Arc::new(ManualClock::new()));

    let err = client.get("/items").await.unwrap_err();

    assert_eq!(transport.calls(), 4);
    match &err {
        ExecutorError::RetriesExhausted { attempts, cause, .. } => {
            assert_eq!(*attempts, 4);
            assert!(matches!(cause, AttemptError::Status { status, .. } if *status == StatusCode::SERVICE_UNAVAILABLE));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    assert_eq!(err.response_body(), Some("overloaded"));
    assert!(err.is_unavailable());
    assert_eq!(client.breaker_stats().failure_count, 4);
    assert_eq!(client.breaker_stats().state, CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_retry_then_success() {
    let transport = ScriptedTransport::new([
        Step::Text(503, ""),
        Step::Fail(TransportError::TimedOut),
        Step::Json(200, r#"{"id":7}"#),
    ]);
    let client = scripted_client(config(3, 5), transport.clone(), Arc::new(ManualClock::new()));

    let response = client.get("/items/7").await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.attempts, 3);
    assert_eq!(response.body, ParsedBody::Json(json!({"id": 7})));
    assert_eq!(transport.calls(), 3);

    let stats = client.breaker_stats();
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_backoff_timing() {
    let transport = ScriptedTransport::with_fallback([], Step::Text(429, "slow down"));
    let client = scripted_client(config(2, 5), transport.clone(), Arc::new(ManualClock::new()));

    let err = client.get("/quota").await.unwrap_err();
    assert!(matches!(err, ExecutorError::RetriesExhausted { attempts: 3, .. }), "got {err:?}");
    assert_eq!(err.status_code(), Some(StatusCode::TOO_MANY_REQUESTS));

    let seen = transport.seen();
    assert_eq!(seen.len(), 3);
    let first_gap = seen[1].0 - seen[0].0;
    let second_gap = seen[2].0 - seen[1].0;
    assert!(first_gap >= Duration::from_millis(100) && first_gap < Duration::from_millis(110));
    assert!(second_gap >= Duration::from_millis(200) && second_gap < Duration::from_millis(210));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_then_recovers() {
    let transport = ScriptedTransport::new([
        Step::Text(429, "slow down"),
        Step::Json(200, r#"{"remaining":10}"#),
    ]);
    let client = scripted_client(config(2, 5), transport.clone(), Arc::new(ManualClock::new()));

    let response = client.get("/quota").await.unwrap();
    assert_eq!(response.attempts, 2);
    assert_eq!(response.body, ParsedBody::Json(json!({"remaining": 10})));
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_fails_fast_and_recovers() {
    let transport = ScriptedTransport::new([
        Step::Text(500, "boom"),
        Step::Text(500, "boom"),
        Step::Text(500, "boom"),
        Step::Json(200, r#"{"ok":true}"#),
    ]);
    let clock = Arc::new(ManualClock::new());
    let client = scripted_client(config(0, 3), transport.clone(), clock.clone());

    for _ in 0..3 {
        let err = client.get("/orders").await.unwrap_err();
        assert!(matches!(err, ExecutorError::RetriesExhausted { attempts: 1, .. }));
    }
    assert_eq!(client.breaker_stats().state, CircuitState::Open);
    assert_eq!(transport.calls(), 3);

    // Fails fast without touching the network.
    let err = client.get("/orders").await.unwrap_err();
    match &err {
        ExecutorError::CircuitOpen(open) => {
            assert_eq!(open.state, CircuitState::Open);
            assert!(open.retry_after.is_some());
        }
        other => panic!("expected CircuitOpen, got {other:?}"),
    }
    assert_eq!(err.outcome(), "circuit_open");
    assert_eq!(transport.calls(), 3);

    clock.advance(Duration::from_secs(30));
    let response = client.get("/orders").await.unwrap();
    assert_eq!(response.body, ParsedBody::Json(json!({"ok": true})));

    let stats = client.breaker_stats();
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.failure_count, 0);
    assert_eq!(stats.total_trips, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_trial_reopens_breaker() {
    let transport = ScriptedTransport::with_fallback([], Step::Text(502, ""));
    let clock = Arc::new(ManualClock::new());
    let client = scripted_client(config(0, 1), transport.clone(), clock.clone());

    client.get("/").await.unwrap_err();
    assert_eq!(client.breaker_stats().state, CircuitState::Open);

    clock.advance(Duration::from_secs(30));
    client.get("/").await.unwrap_err();
    assert_eq!(client.breaker_stats().state, CircuitState::Open);
    assert_eq!(client.breaker_stats().total_trips, 2);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_circuit_opening_during_backoff_aborts_retries() {
    let transport = ScriptedTransport::with_fallback([], Step::Text(503, ""));
    let client = scripted_client(config(5, 2), transport.clone(), Arc::new(ManualClock::new()));

    let err = client.get("/items").await.unwrap_err();

    assert!(matches!(err, ExecutorError::CircuitOpen(_)), "got {err:?}");
    assert_eq!(transport.calls(), 2);
    assert_eq!(client.breaker_stats().state, CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_never_reaches_transport() {
    let transport = ScriptedTransport::new([]);
    let auth = CountingAuth::failing();
    let client = ResilientClient::builder(config(3, 1))
        .transport(transport.clone())
        .auth(auth.clone())
        .clock(Arc::new(ManualClock::new()))
        .build()
        .unwrap();

    let err = client.get("/secure").await.unwrap_err();

    assert!(matches!(err, ExecutorError::Auth(AuthError::Provider(_))));
    assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.calls(), 0);
    let stats = client.breaker_stats();
    assert_eq!(stats.failure_count, 0);
    assert_eq!(stats.state, CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_auth_runs_once_per_call_and_headers_reach_every_attempt() {
    let transport = ScriptedTransport::new([Step::Text(503, ""), Step::Text(503, ""), Step::Json(200, "{}")]);
    let auth = CountingAuth::ok();
    let client = ResilientClient::builder(config(3, 5))
        .transport(transport.clone())
        .auth(auth.clone())
        .clock(Arc::new(ManualClock::new()))
        .random(Arc::new(FixedRandom(0.5)))
        .build()
        .unwrap();

    client
        .execute(Method::GET, "/secure", RequestOptions::new().trace_id("trace-abc"))
        .await
        .unwrap();

    assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
    let seen = transport.seen();
    assert_eq!(seen.len(), 3);
    for (_, request) in &seen {
        assert_eq!(request.headers.get(AUTHORIZATION).unwrap(), "Bearer test-token");
        assert_eq!(request.headers.get("x-request-id").unwrap(), "trace-abc");
    }
}

#[tokio::test(start_paused = true)]
async fn test_generated_request_id_is_stable_across_attempts() {
    let transport = ScriptedTransport::new([Step::Text(500, ""), Step::Json(200, "{}")]);
    let client = scripted_client(config(2, 5), transport.clone(), Arc::new(ManualClock::new()));

    client.get("/items").await.unwrap();

    let seen = transport.seen();
    let first = seen[0].1.headers.get("x-request-id").unwrap().clone();
    let second = seen[1].1.headers.get("x-request-id").unwrap().clone();
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_attempt_timeout_is_retried() {
    let transport = ScriptedTransport::new([Step::Hang, Step::Json(200, "{}")]);
    let client = scripted_client(config(2, 5), transport.clone(), Arc::new(ManualClock::new()));

    let started = Instant::now();
    let response = client
        .execute(
            Method::GET,
            "/slow",
            RequestOptions::new().timeout(Duration::from_millis(250)),
        )
        .await
        .unwrap();

    assert_eq!(response.attempts, 2);
    assert_eq!(transport.calls(), 2);
    // One deadline plus one backoff delay.
    assert!(started.elapsed() >= Duration::from_millis(350));
}

#[tokio::test(start_paused = true)]
async fn test_every_attempt_timing_out_exhausts_retries() {
    let transport = ScriptedTransport::with_fallback([], Step::Hang);
    let client = scripted_client(config(1, 5), transport.clone(), Arc::new(ManualClock::new()));

    let err = client.get("/slow").await.unwrap_err();

    match err {
        ExecutorError::RetriesExhausted { attempts, cause, .. } => {
            assert_eq!(attempts, 2);
            assert!(matches!(cause, AttemptError::TimedOut(d) if d == Duration::from_secs(1)));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_attempt() {
    let transport = ScriptedTransport::with_fallback([], Step::Hang);
    let client = scripted_client(config(3, 5), transport.clone(), Arc::new(ManualClock::new()));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = client
        .execute(Method::GET, "/slow", RequestOptions::new().cancel_token(cancel))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutorError::Cancelled { attempts: 1, .. }), "got {err:?}");
    assert_eq!(err.outcome(), "cancelled");
    assert_eq!(transport.calls(), 1);
    assert_eq!(client.breaker_stats().failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_backoff() {
    let transport = ScriptedTransport::with_fallback([], Step::Text(503, ""));
    let mut cfg = config(3, 5);
    cfg.retry.min_delay_ms = 5_000;
    let client = scripted_client(cfg, transport.clone(), Arc::new(ManualClock::new()));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = client
        .execute(Method::GET, "/items", RequestOptions::new().cancel_token(cancel))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutorError::Cancelled { attempts: 1, .. }), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(transport.calls(), 1);
    // The failed attempt before the backoff still counts.
    assert_eq!(client.breaker_stats().failure_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_already_cancelled_token_sends_nothing() {
    let transport = ScriptedTransport::new([]);
    let client = scripted_client(config(3, 5), transport.clone(), Arc::new(ManualClock::new()));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = client
        .execute(Method::GET, "/items", RequestOptions::new().cancel_token(cancel))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutorError::Cancelled { .. }));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_client_error_is_terminal() {
    let transport = ScriptedTransport::new([Step::Json(404, r#"{"error":"no such item"}"#)]);
    let client = scripted_client(config(3, 5), transport.clone(), Arc::new(ManualClock::new()));

    let err = client.get("/items/404").await.unwrap_err();

    assert!(matches!(err, ExecutorError::Terminal { attempts: 1, .. }));
    assert_eq!(err.status_code(), Some(StatusCode::NOT_FOUND));
    assert_eq!(err.response_body(), Some(r#"{"error":"no such item"}"#));
    assert_eq!(transport.calls(), 1);
    assert_eq!(client.breaker_stats().failure_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_connection_failure_is_terminal() {
    let transport = ScriptedTransport::new([Step::Fail(TransportError::Connect("refused".into()))]);
    let client = scripted_client(config(3, 5), transport.clone(), Arc::new(ManualClock::new()));

    let err = client.get("/items").await.unwrap_err();

    assert!(matches!(
        err.attempt_error(),
        Some(AttemptError::Transport(TransportError::Connect(_)))
    ));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_success_body_is_terminal() {
    let transport = ScriptedTransport::new([Step::Json(200, "{not json")]);
    let client = scripted_client(config(3, 5), transport.clone(), Arc::new(ManualClock::new()));

    let err = client.get("/items").await.unwrap_err();

    assert!(matches!(err.attempt_error(), Some(AttemptError::Decode(_))));
    assert_eq!(transport.calls(), 1);
    assert_eq!(client.breaker_stats().failure_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_content_and_text_bodies() {
    let transport = ScriptedTransport::new([Step::Json(204, ""), Step::Text(200, "pong")]);
    let client = scripted_client(config(0, 5), transport.clone(), Arc::new(ManualClock::new()));

    let deleted = client.delete("/items/7").await.unwrap();
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert!(deleted.body.is_empty());

    let pong = client.get("/ping").await.unwrap();
    assert_eq!(pong.body, ParsedBody::Text("pong".into()));
}

#[tokio::test(start_paused = true)]
async fn test_json_body_and_query_reach_transport() {
    let transport = ScriptedTransport::new([Step::Json(201, r#"{"id":9}"#)]);
    let client = scripted_client(config(0, 5), transport.clone(), Arc::new(ManualClock::new()));

    let response = client
        .execute(
            Method::POST,
            "/items",
            RequestOptions::new().json(json!({"name": "widget"})).query("dry_run", "false"),
        )
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::CREATED);

    let seen = transport.seen();
    let request = &seen[0].1;
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.url.as_str(), "http://inventory.test/items?dry_run=false");
    assert_eq!(request.headers.get(CONTENT_TYPE).unwrap(), "application/json");
    let body: serde_json::Value = serde_json::from_slice(request.body.as_deref().unwrap()).unwrap();
    assert_eq!(body, json!({"name": "widget"}));
}

#[tokio::test(start_paused = true)]
async fn test_half_open_admits_single_trial() {
    let transport = ScriptedTransport::new([
        Step::Text(500, ""),
        Step::Slow(Duration::from_millis(200), 200),
    ]);
    let clock = Arc::new(ManualClock::new());
    let client = scripted_client(config(0, 1), transport.clone(), clock.clone());

    client.get("/").await.unwrap_err();
    assert_eq!(client.breaker_stats().state, CircuitState::Open);
    clock.advance(Duration::from_secs(30));

    let trial = tokio::spawn({
        let client = client.clone();
        async move { client.get("/").await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let err = client.get("/").await.unwrap_err();
    match err {
        ExecutorError::CircuitOpen(open) => assert_eq!(open.state, CircuitState::HalfOpen),
        other => panic!("expected CircuitOpen, got {other:?}"),
    }

    trial.await.unwrap().unwrap();
    assert_eq!(client.breaker_stats().state, CircuitState::Closed);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_trial_releases_half_open_slot() {
    let transport = ScriptedTransport::new([Step::Text(500, ""), Step::Hang, Step::Json(200, "{}")]);
    let clock = Arc::new(ManualClock::new());
    let client = scripted_client(config(0, 1), transport.clone(), clock.clone());

    client.get("/").await.unwrap_err();
    clock.advance(Duration::from_secs(30));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let err = client
        .execute(Method::GET, "/", RequestOptions::new().cancel_token(cancel))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::Cancelled { .. }));
    assert_eq!(client.breaker_stats().state, CircuitState::HalfOpen);
    assert_eq!(client.breaker_stats().half_open_in_flight, 0);

    client.get("/").await.unwrap();
    assert_eq!(client.breaker_stats().state, CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_breaker_never_rejects() {
    let transport = ScriptedTransport::with_fallback([], Step::Text(500, ""));
    let mut cfg = config(0, 1);
    cfg.circuit_breaker.enabled = false;
    let client = scripted_client(cfg, transport.clone(), Arc::new(ManualClock::new()));

    for _ in 0..5 {
        let err = client.get("/").await.unwrap_err();
        assert!(matches!(err, ExecutorError::RetriesExhausted { .. }));
    }
    assert_eq!(transport.calls(), 5);
    assert_eq!(client.breaker_stats().state, CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_health_check_bypasses_open_breaker() {
    let transport = ScriptedTransport::new([Step::Json(200, r#"{"status":"ok"}"#)]);
    let client = scripted_client(config(0, 1), transport.clone(), Arc::new(ManualClock::new()));

    client.breaker().record_failure();
    assert_eq!(client.breaker_stats().state, CircuitState::Open);

    assert!(client.health_check("/health", Duration::from_secs(1)).await);
    assert_eq!(transport.calls(), 1);
    let stats = client.breaker_stats();
    assert_eq!(stats.state, CircuitState::Open);
    assert_eq!(stats.failure_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_health_check_failure_does_not_feed_breaker() {
    let transport = ScriptedTransport::with_fallback([], Step::Text(503, ""));
    let client = scripted_client(config(0, 1), transport.clone(), Arc::new(ManualClock::new()));

    assert!(!client.health_check_default().await);
    // Primary path and fallback path, no retries.
    assert_eq!(transport.calls(), 2);
    assert_eq!(client.breaker_stats().failure_count, 0);
    assert_eq!(client.breaker_stats().state, CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_health_check_uses_fallback_path() {
    let transport = ScriptedTransport::new([Step::Text(404, ""), Step::Text(200, "ok")]);
    let client = scripted_client(config(0, 5), transport.clone(), Arc::new(ManualClock::new()));

    assert!(client.health_check("/health", Duration::from_secs(1)).await);

    let paths: Vec<String> = transport
        .seen()
        .iter()
        .map(|(_, r)| r.url.path().to_string())
        .collect();
    assert_eq!(paths, vec!["/health", "/"]);
}

#[tokio::test(start_paused = true)]
async fn test_health_check_times_out() {
    let transport = ScriptedTransport::with_fallback([], Step::Hang);
    let mut cfg = config(0, 5);
    cfg.health.fallback_path = None;
    let client = scripted_client(cfg, transport.clone(), Arc::new(ManualClock::new()));

    let started = Instant::now();
    assert!(!client.health_check("/health", Duration::from_millis(300)).await);
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_health_check_with_failing_auth_is_unhealthy() {
    let transport = ScriptedTransport::new([]);
    let client = ResilientClient::builder(config(0, 5))
        .transport(transport.clone())
        .auth(CountingAuth::failing())
        .build()
        .unwrap();

    assert!(!client.health_check("/health", Duration::from_secs(1)).await);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_calls_share_breaker() {
    let transport = ScriptedTransport::with_fallback([], Step::Text(500, ""));
    let client = scripted_client(config(0, 4), transport.clone(), Arc::new(ManualClock::new()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get("/").await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().is_err());
    }

    // Calls admitted before the breaker tripped still reached the transport;
    // everything after it did not.
    let stats = client.breaker_stats();
    assert_eq!(stats.state, CircuitState::Open);
    assert!(transport.calls() >= 4);
    assert!(transport.calls() <= 8);
    assert_eq!(stats.total_trips, 1);
}
