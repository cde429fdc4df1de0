//! End-to-end control-plane scenarios, driven through the axum router
//! in-process.

// Test code may panic/unwrap freely
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use flowforge_core::{DecisionAction, PolicyLimits, Redactor, Telemetry};
use flowforge_daemon::app::App;
use flowforge_daemon::config::Config;
use flowforge_daemon::env::CloudProbes;
use flowforge_daemon::lifecycle::{CommandCtx, RunSpec};
use flowforge_ledger::{ColumnCipher, Ledger};
use flowforge_policy::decide;
use http_body_util::BodyExt;
use std::time::Duration;
use tower::ServiceExt;

const API_KEY: &str = "test-api-key";

fn test_config(dir: &std::path::Path, api_key: Option<&str>, restart_max: u32) -> Config {
    Config {
        bind_host: "127.0.0.1".into(),
        port: 0,
        api_key: api_key.map(|s| s.to_string()),
        allowed_origin: None,
        state_dir: dir.to_path_buf(),
        db_path: dir.join("ledger.db"),
        log_path: dir.join("daemon.log"),
        pid_path: dir.join("daemon.pid"),
        lock_path: dir.join("daemon.lock"),
        policy_limits: PolicyLimits::default(),
        baseline: flowforge_policy::BaselineConfig::default(),
        restart_window: Duration::from_secs(60),
        restart_max,
        stop_timeout: Duration::from_secs(2),
        monitor_interval: Duration::from_millis(200),
        rate_limit_per_minute: 10_000,
        auth_block_duration: Duration::from_secs(60),
        cloud: CloudProbes::default(),
        safety: flowforge_daemon::env::SafetyLimits::default(),
        encrypted: false,
    }
}

fn test_app(dir: &std::path::Path, api_key: Option<&str>, restart_max: u32) -> App {
    let redactor = Redactor::new();
    let ledger = Ledger::open_in_memory(ColumnCipher::plaintext(), redactor.clone()).unwrap();
    App::build_with_ledger(
        test_config(dir, api_key, restart_max),
        RunSpec {
            command: "sleep".into(),
            args: vec!["60".into()],
            working_dir: std::env::temp_dir(),
        },
        ledger,
        redactor,
    )
    .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

fn post(uri: &str, body: &str, key: Option<&str>, idem: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
    }
    if let Some(idem) = idem {
        builder = builder.header("Idempotency-Key", idem);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap_or(serde_json::Value::Null)
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(std::time::Instant::now() < deadline, "condition not reached");
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

fn spike_telemetry(lines: &[String]) -> Telemetry {
    use flowforge_daemon::monitor::signals;
    Telemetry {
        cpu_percent: 96.0,
        cpu_over_for: Duration::from_secs(15),
        log_repetition: signals::repetition_ratio(lines),
        log_entropy: signals::shannon_entropy(lines),
        raw_diversity: signals::raw_diversity(lines),
        progress_like: signals::progress_like(lines),
    }
}

// A healthy spike is alerted, never killed.
#[tokio::test]
async fn healthy_spike_is_alerted_not_killed() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Some(API_KEY), 10);

    let lines: Vec<String> = (1..=10)
        .map(|i| format!("progress step={i} phase=compute metric=0.9{i:02}"))
        .collect();
    let telemetry = spike_telemetry(&lines);
    let limits = PolicyLimits::default();
    let decision = decide(&telemetry, &limits);
    assert_eq!(decision.action, DecisionAction::Alert);
    assert!(
        decision.reason.contains("progressing output pattern detected"),
        "{}",
        decision.reason
    );

    app.lifecycle.enact_policy(decision, telemetry);
    wait_for(|| {
        !app.state
            .ledger
            .timeline_page(Some(50), 0)
            .unwrap()
            .items
            .is_empty()
    })
    .await;

    let page = app.state.ledger.timeline_page(Some(50), 0).unwrap();
    assert!(
        page.items.iter().any(|e| e.title == "ALERT"),
        "alert audit missing"
    );
    assert!(
        !page.items.iter().any(|e| e.title == "AUTO_KILL"),
        "healthy spike must never be killed"
    );
    app.shutdown().await;
}

// An infinite looper is killed: incident + audit + verifiable trace.
#[tokio::test]
async fn infinite_looper_is_killed() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Some(API_KEY), 10);
    let router = app.router();

    app.lifecycle
        .request_start(CommandCtx::internal("scenario"))
        .await;

    let lines: Vec<String> =
        vec!["processing request 4242 failed, retrying endlessly".to_string(); 10];
    let telemetry = spike_telemetry(&lines);
    let decision = decide(&telemetry, &PolicyLimits::default());
    assert_eq!(decision.action, DecisionAction::Kill);

    app.lifecycle.enact_policy(decision, telemetry);
    wait_for(|| {
        app.state
            .ledger
            .list_incidents(Some(10), 0)
            .unwrap()
            .items
            .len()
            == 1
    })
    .await;

    let (status, _, body) = send(&router, get("/v1/incidents")).await;
    assert_eq!(status, StatusCode::OK);
    let incidents = json(&body);
    let incident = &incidents["items"][0];
    assert_eq!(incident["exit_reason"], "LOOP_DETECTED");
    let incident_id = incident["incident_id"].as_str().unwrap().to_string();

    // correlated AUTO_KILL audit on the incident timeline
    wait_for(|| {
        app.state
            .ledger
            .incident_timeline(&incident_id, None)
            .unwrap()
            .iter()
            .any(|e| e.title == "AUTO_KILL")
    })
    .await;
    let (status, _, body) =
        send(&router, get(&format!("/v1/timeline?incident_id={incident_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let timeline = json(&body);
    let titles: Vec<&str> = timeline["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["title"].as_str())
        .collect();
    assert!(titles.contains(&"AUTO_KILL"), "{titles:?}");

    // the trace has a digest and verification returns MATCH
    let traces = app
        .state
        .ledger
        .recent_decision_traces(1, &flowforge_ledger::TraceFilter::default())
        .unwrap();
    let trace = &traces[0];
    assert!(!trace.replay_digest.is_empty());
    let (status, _, body) = send(
        &router,
        get(&format!("/v1/ops/decisions/replay/{}", trace.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["verdict"], "MATCH");

    app.shutdown().await;
}

// Idempotent restart replay.
#[tokio::test]
async fn idempotent_restart_replay() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Some(API_KEY), 10);
    let router = app.router();
    let key = "00000000-0000-0000-0000-000000000001";

    let (status1, _, body1) = send(
        &router,
        post("/v1/process/restart", r#"{"reason":"op"}"#, Some(API_KEY), Some(key)),
    )
    .await;
    assert_eq!(status1, StatusCode::ACCEPTED, "{}", String::from_utf8_lossy(&body1));
    assert_eq!(json(&body1)["status"], "ACCEPTED");

    let (status2, headers2, body2) = send(
        &router,
        post("/v1/process/restart", r#"{"reason":"op"}"#, Some(API_KEY), Some(key)),
    )
    .await;
    assert_eq!(status2, StatusCode::ACCEPTED);
    assert_eq!(body2, body1, "replay must be byte-identical");
    assert_eq!(headers2.get("idempotency-replayed").unwrap(), "true");

    let (status3, _, body3) = send(
        &router,
        post("/v1/process/restart", r#"{"reason":"other"}"#, Some(API_KEY), Some(key)),
    )
    .await;
    assert_eq!(status3, StatusCode::CONFLICT);
    let problem = json(&body3);
    assert_eq!(
        problem["type"],
        "https://flowforge.dev/problems/idempotency-conflict"
    );
    assert!(problem["request_id"].as_str().is_some_and(|s| !s.is_empty()));

    app.shutdown().await;
}

// Restart budget: the fourth restart inside the window is denied.
#[tokio::test]
async fn restart_budget_denies_fourth() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Some(API_KEY), 3);
    let router = app.router();

    for i in 0..3 {
        let (status, _, body) = send(
            &router,
            post("/v1/process/restart", r#"{"reason":"op"}"#, Some(API_KEY), None),
        )
        .await;
        assert_eq!(
            status,
            StatusCode::ACCEPTED,
            "restart {i}: {}",
            String::from_utf8_lossy(&body)
        );
        wait_for(|| app.supervisor.is_running()).await;
    }

    let (status, headers, body) = send(
        &router,
        post("/v1/process/restart", r#"{"reason":"op"}"#, Some(API_KEY), None),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = headers
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 60, "{retry_after}");
    let problem = json(&body);
    assert_eq!(
        problem["type"],
        "https://flowforge.dev/problems/restart-budget-exceeded"
    );

    wait_for(|| {
        app.state
            .ledger
            .timeline_page(Some(100), 0)
            .unwrap()
            .items
            .iter()
            .any(|e| e.title == "RESTART_BLOCKED")
    })
    .await;

    app.shutdown().await;
}

// Auth enforcement and brute-force blocking.
#[tokio::test]
async fn auth_enforcement() {
    // No API key configured: every unsafe method is a stable 403.
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), None, 10);
    let router = app.router();

    let (status, _, body) = send(
        &router,
        post("/v1/process/kill", r#"{}"#, None, None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json(&body)["type"], "https://flowforge.dev/problems/forbidden");

    let delete = Request::builder()
        .method(Method::DELETE)
        .uri("/v1/process/kill")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&router, delete).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", String::from_utf8_lossy(&body));
    app.shutdown().await;

    // With a key: 11 wrong bearers then the 12th answer is the auth block.
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Some(API_KEY), 10);
    let router = app.router();
    for i in 0..11 {
        let (status, _, _) = send(
            &router,
            post("/v1/process/kill", r#"{}"#, Some("wrong-bearer"), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "attempt {i}");
    }
    let (status, _, body) = send(
        &router,
        post("/v1/process/kill", r#"{}"#, Some("wrong-bearer"), None),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        json(&body)["type"],
        "https://flowforge.dev/problems/auth-rate-limited"
    );
    // independent of payload: a GET from the same client is also blocked
    let (status, _, _) = send(&router, get("/v1/incidents")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    app.shutdown().await;
}

// Signal baseline escalation and recovery over the ops endpoint.
#[tokio::test]
async fn signal_baseline_escalation() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Some(API_KEY), 10);
    let router = app.router();
    let ledger = app.state.ledger.clone();

    let push = |cpu: f64, at: &str| {
        ledger
            .append_decision_trace(
                &flowforge_ledger::NewDecisionTrace {
                    run_id: "run-baseline".into(),
                    command: "worker".into(),
                    pid: Some(1),
                    cpu_score: cpu,
                    entropy_score: 50.0,
                    confidence_score: 60.0,
                    decision: "CONTINUE".into(),
                    reason: "within limits".into(),
                    decision_engine: "threshold-decider".into(),
                    engine_version: "1.1.0".into(),
                    decision_contract_version: "decision-trace/1".into(),
                    rollout_mode: "enforce".into(),
                    replay_contract_version: "replay-digest/1".into(),
                    incident_id: None,
                    request_id: None,
                },
                at,
            )
            .unwrap()
    };

    // baseline of four at cpu 40, then a drifted latest
    for i in 0..4 {
        push(40.0, &format!("2026-01-01T00:00:0{i}Z"));
    }
    push(95.0, "2026-01-01T00:01:00Z");

    let (status, _, body) = send(&router, get("/v1/ops/decisions/signals/baseline")).await;
    assert_eq!(status, StatusCode::OK);
    let first = json(&body);
    assert_eq!(first["buckets"][0]["status"], "pending");

    // second drifted latest promotes the bucket
    push(95.0, "2026-01-01T00:02:00Z");
    let request = Request::builder()
        .uri("/v1/ops/decisions/signals/baseline")
        .header("x-request-id", "req-baseline")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    let second = json(&body);
    assert_eq!(second["buckets"][0]["status"], "at_risk");

    let chain = ledger.events_by_request("req-baseline", None).unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].title, "SIGNAL_BASELINE_AT_RISK");

    // a healthy latest recovers the bucket
    push(41.0, "2026-01-01T00:03:00Z");
    let (_, _, body) = send(&router, get("/v1/ops/decisions/signals/baseline")).await;
    assert_eq!(json(&body)["buckets"][0]["status"], "healthy");
    let recovered = ledger
        .timeline_page(Some(50), 0)
        .unwrap()
        .items
        .iter()
        .any(|e| e.title == "SIGNAL_BASELINE_RECOVERED");
    assert!(recovered, "recovery audit missing");

    app.shutdown().await;
}

// Boundary behaviors: limits and cursors out of range are 400s.
#[tokio::test]
async fn boundary_validation_on_reads() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), None, 10);
    let router = app.router();

    for uri in [
        "/v1/incidents?limit=0",
        "/v1/incidents?limit=501",
        "/v1/timeline?limit=0",
        "/v1/timeline?cursor=-1",
        "/v1/timeline?cursor=0",
    ] {
        let (status, _, body) = send(&router, get(uri)).await;
        assert_eq!(
            status,
            StatusCode::BAD_REQUEST,
            "{uri}: {}",
            String::from_utf8_lossy(&body)
        );
        assert_eq!(json(&body)["type"], "https://flowforge.dev/problems/validation");
    }

    app.shutdown().await;
}

// Legacy (non-/v1) aliases serve the same handlers during deprecation.
#[tokio::test]
async fn legacy_routes_alias_v1() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), None, 10);
    let router = app.router();

    for uri in ["/incidents", "/v1/incidents", "/worker/lifecycle", "/v1/worker/lifecycle"] {
        let (status, _, _) = send(&router, get(uri)).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
    }
    let (status, _, body) = send(&router, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "ok");

    let (status, _, body) = send(&router, get("/v1/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("flowforge_stop_slo_target_seconds 3"), "{text}");

    app.shutdown().await;
}

// Every response carries the request id; CORS never echoes foreign origins.
#[tokio::test]
async fn request_id_and_cors_contracts() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), None, 10);
    let router = app.router();

    let request = Request::builder()
        .uri("/v1/incidents")
        .header("x-request-id", "req-corr-1")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(&router, request).await;
    assert_eq!(headers.get("x-request-id").unwrap(), "req-corr-1");
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );

    let request = Request::builder()
        .uri("/v1/incidents")
        .header(header::ORIGIN, "https://evil.example.com")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(&router, request).await;
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://127.0.0.1"
    );
    assert!(headers.get("x-request-id").is_some());

    app.shutdown().await;
}

// /readyz reflects component health.
#[tokio::test]
async fn readyz_reports_checks() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), None, 10);
    let router = app.router();

    let (status, _, body) = send(&router, get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);
    let report = json(&body);
    assert_eq!(report["ready"], true);
    assert_eq!(report["checks"]["database"], true);
    assert_eq!(report["checks"]["lifecycle"], true);

    app.shutdown().await;
}
