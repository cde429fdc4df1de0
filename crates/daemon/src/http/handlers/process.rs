//! Worker lifecycle reads and operator mutations.

use crate::http::middleware::RequestId;
use crate::http::problem::Problem;
use crate::http::AppState;
use crate::lifecycle::CommandCtx;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use flowforge_core::{CommandStatus, ErrorKind, LifecycleDecision};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
pub struct ReasonBody {
    #[serde(default)]
    pub reason: Option<String>,
}

/// `GET /worker/lifecycle`: deep-copy snapshot of the process state.
pub async fn lifecycle(State(state): State<AppState>) -> Response {
    let snapshot = state.process_state.lock().snapshot();
    Json(snapshot).into_response()
}

fn decision_response(
    decision: LifecycleDecision,
    instance: &str,
    request_id: &str,
) -> Response {
    match decision.status {
        CommandStatus::Accepted | CommandStatus::InProgress | CommandStatus::Replayed => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": decision.status,
                "pid": decision.pid,
                "lifecycle": decision.lifecycle,
            })),
        )
            .into_response(),
        CommandStatus::Rejected => Problem::from_error_kind(
            decision.error_kind.unwrap_or(ErrorKind::Internal),
            decision.retry_after_seconds,
        )
        .instance(instance)
        .request_id(request_id)
        .into_response(),
    }
}

/// `POST /process/kill` body `{reason?}`.
pub async fn kill(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    body: Option<Json<ReasonBody>>,
) -> Response {
    let reason = body
        .and_then(|Json(b)| b.reason)
        .unwrap_or_else(|| "operator kill".to_string());
    let ctx = CommandCtx::operator(reason, Some(request_id.clone()));
    let decision = state.lifecycle.request_stop(ctx).await;
    decision_response(decision, "/v1/process/kill", &request_id)
}

/// `POST /process/restart` body `{reason?}`. Budget denials come back 429
/// with a `Retry-After` header.
pub async fn restart(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    body: Option<Json<ReasonBody>>,
) -> Response {
    let reason = body
        .and_then(|Json(b)| b.reason)
        .unwrap_or_else(|| "operator restart".to_string());
    let ctx = CommandCtx::operator(reason, Some(request_id.clone()));
    let decision = state.lifecycle.request_restart(ctx).await;
    decision_response(decision, "/v1/process/restart", &request_id)
}
