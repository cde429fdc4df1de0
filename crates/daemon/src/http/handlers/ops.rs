//! Operational endpoints: decision replay, signal baseline, request-scoped
//! traces and control-plane replay history.

use super::ledger_problem;
use crate::http::middleware::RequestId;
use crate::http::problem::Problem;
use crate::http::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use flowforge_core::Clock;
use flowforge_ledger::TraceFilter;
use flowforge_policy::verify;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Debug, Default, Deserialize)]
pub struct StrictQuery {
    #[serde(default)]
    pub strict: Option<bool>,
    pub limit: Option<usize>,
}

/// `GET /ops/decisions/replay/{trace_id}?strict=`
pub async fn replay_one(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(trace_id): Path<i64>,
    Query(query): Query<StrictQuery>,
) -> Response {
    let instance = format!("/v1/ops/decisions/replay/{trace_id}");
    let trace = match state.ledger.get_decision_trace(trace_id) {
        Ok(Some(trace)) => trace,
        Ok(None) => {
            return Problem::not_found(format!("decision trace {trace_id}"))
                .instance(instance)
                .request_id(request_id)
                .into_response()
        }
        Err(e) => return ledger_problem(e, &instance, &request_id).into_response(),
    };

    let verdict = verify(&trace);
    state.metrics.replay_verified(verdict.as_str());
    let strict = query.strict.unwrap_or(false);
    if strict && !verdict.is_match() {
        return Problem::replay_mismatch(format!(
            "trace {trace_id} verification returned {}",
            verdict.as_str()
        ))
        .instance(instance)
        .request_id(request_id)
        .into_response();
    }

    let body = json!({
        "trace_id": trace_id,
        "verdict": verdict.as_str(),
        "stored_digest": trace.replay_digest,
        "computed_digest": flowforge_policy::compute_digest(&trace),
        "replay_contract_version": trace.replay_contract_version,
        "strict": strict,
    });
    Json(body).into_response()
}

/// `GET /ops/decisions/replay/health?limit=&strict=`
pub async fn replay_health(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(query): Query<StrictQuery>,
) -> Response {
    let instance = "/v1/ops/decisions/replay/health";
    let limit = query.limit.unwrap_or(100).clamp(1, 5_000);
    let traces = match state
        .ledger
        .recent_decision_traces(limit, &TraceFilter::default())
    {
        Ok(traces) => traces,
        Err(e) => return ledger_problem(e, instance, &request_id).into_response(),
    };

    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for trace in &traces {
        let verdict = verify(trace);
        state.metrics.replay_verified(verdict.as_str());
        *counts.entry(verdict.as_str()).or_default() += 1;
    }
    let mismatches = counts.get("MISMATCH").copied().unwrap_or(0);

    let strict = query.strict.unwrap_or(false);
    if strict && mismatches > 0 {
        return Problem::replay_mismatch(format!("{mismatches} trace(s) failed verification"))
            .instance(instance)
            .request_id(request_id)
            .into_response();
    }

    Json(json!({
        "checked": traces.len(),
        "counts": counts,
        "strict": strict,
        "status": if mismatches == 0 { "ok" } else { "failing" },
    }))
    .into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct BaselineQuery {
    pub limit: Option<usize>,
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    pub rollout_mode: Option<String>,
    #[serde(default)]
    pub strict: Option<bool>,
}

/// `GET /ops/decisions/signals/baseline?limit=&engine=&engine_version=&rollout_mode=&strict=`
pub async fn signals_baseline(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(query): Query<BaselineQuery>,
) -> Response {
    let instance = "/v1/ops/decisions/signals/baseline";
    let mut config = state.config.baseline.clone();
    if let Some(limit) = query.limit {
        config.trace_limit = limit;
        config = config.clamped();
    }
    let filter = TraceFilter {
        engine: query.engine.clone(),
        engine_version: query.engine_version.clone(),
        rollout_mode: query.rollout_mode.clone(),
    };
    let now = state.clock.now_rfc3339();
    let evaluations = match crate::baseline::evaluate_all(
        &state.ledger,
        &config,
        &filter,
        Some(&request_id),
        &now,
    ) {
        Ok(evaluations) => evaluations,
        Err(e) => return ledger_problem(e, instance, &request_id).into_response(),
    };

    let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
    for eval in &evaluations {
        *status_counts.entry(eval.status.to_string()).or_default() += 1;
    }
    state.metrics.baseline_bucket_counts(
        &status_counts
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect::<Vec<_>>(),
    );

    let at_risk = status_counts.get("at_risk").copied().unwrap_or(0);
    if query.strict.unwrap_or(false) && at_risk > 0 {
        return Problem::new(
            "signal-baseline-at-risk",
            "Signal baseline at risk",
            StatusCode::CONFLICT,
            format!("{at_risk} bucket(s) at risk"),
        )
        .instance(instance)
        .request_id(request_id)
        .into_response();
    }

    Json(json!({
        "buckets": evaluations,
        "status_counts": status_counts,
        "evaluated_at": now,
    }))
    .into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// `GET /ops/requests/{request_id}?limit=`: the causal chain for one
/// request id.
pub async fn request_chain(
    State(state): State<AppState>,
    Extension(RequestId(own_request_id)): Extension<RequestId>,
    Path(request_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Response {
    let instance = format!("/v1/ops/requests/{request_id}");
    match state.ledger.events_by_request(&request_id, query.limit) {
        Ok(items) => Json(json!({
            "request_id": request_id,
            "items": items,
        }))
        .into_response(),
        Err(e) => ledger_problem(e, &instance, &own_request_id).into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub days: Option<u32>,
}

/// `GET /ops/controlplane/replay/history?days=`: up to 90 days of
/// replay/conflict counts.
pub async fn replay_history(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let instance = "/v1/ops/controlplane/replay/history";
    let days = query.days.unwrap_or(30).clamp(1, 90);
    let now = state.clock.now_rfc3339();
    match state.ledger.replay_history(days, &now) {
        Ok(items) => Json(json!({ "days": days, "items": items })).into_response(),
        Err(e) => ledger_problem(e, instance, &request_id).into_response(),
    }
}
