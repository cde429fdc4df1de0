//! HTTP control plane: router, shared state and the middleware stack.
//!
//! The same handler set is mounted under both `/` and `/v1` while the legacy
//! routes ride out their deprecation.

pub mod handlers;
pub mod idempotency;
pub mod middleware;
pub mod problem;
pub mod ratelimit;

use crate::config::Config;
use crate::lifecycle::{LifecycleHandle, SharedProcessState};
use crate::metrics::Metrics;
use crate::readiness::Readiness;
use axum::routing::{get, post};
use axum::Router;
use flowforge_core::SystemClock;
use flowforge_ledger::Ledger;
use idempotency::InFlightKeys;
use ratelimit::RateLimiter;
use std::sync::Arc;

/// Shared state handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ledger: Ledger,
    pub lifecycle: LifecycleHandle,
    pub process_state: SharedProcessState,
    pub metrics: Arc<Metrics>,
    pub ratelimit: Arc<RateLimiter>,
    pub idempotency: Arc<InFlightKeys>,
    pub readiness: Arc<Readiness>,
    pub clock: SystemClock,
}

/// Build the full router with the middleware chain
/// (outer to inner): request-id → CORS → rate limit → auth → idempotency →
/// handler → metrics counter.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/incidents", get(handlers::incidents::list))
        .route("/timeline", get(handlers::incidents::timeline))
        .route("/worker/lifecycle", get(handlers::process::lifecycle))
        .route("/process/kill", post(handlers::process::kill))
        .route("/process/restart", post(handlers::process::restart))
        .route("/metrics", get(handlers::health::metrics))
        .route(
            "/ops/decisions/replay/health",
            get(handlers::ops::replay_health),
        )
        .route(
            "/ops/decisions/replay/:trace_id",
            get(handlers::ops::replay_one),
        )
        .route(
            "/ops/decisions/signals/baseline",
            get(handlers::ops::signals_baseline),
        )
        .route("/ops/requests/:request_id", get(handlers::ops::request_chain))
        .route(
            "/ops/controlplane/replay/history",
            get(handlers::ops::replay_history),
        );

    Router::new()
        .nest("/v1", api.clone())
        .merge(api)
        .route("/healthz", get(handlers::health::healthz))
        .route("/readyz", get(handlers::health::readyz))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::count_request,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            idempotency::idempotency,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::cors,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id))
        .layer(tower_http::timeout::TimeoutLayer::new(
            std::time::Duration::from_secs(15),
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
