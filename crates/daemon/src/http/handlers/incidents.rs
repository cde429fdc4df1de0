//! Incident and timeline reads.

use super::ledger_problem;
use crate::http::middleware::RequestId;
use crate::http::problem::Problem;
use crate::http::AppState;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<usize>,
    pub cursor: Option<i64>,
    pub incident_id: Option<String>,
}

/// Explicit `cursor<=0` is a client error; an absent cursor means newest-first.
fn effective_cursor(query: &PageQuery) -> Result<i64, Problem> {
    match query.cursor {
        None => Ok(0),
        Some(c) if c > 0 => Ok(c),
        Some(c) => Err(Problem::validation(format!("cursor must be positive, got {c}"))),
    }
}

/// `GET /incidents?limit=&cursor=`
pub async fn list(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(query): Query<PageQuery>,
) -> Response {
    let cursor = match effective_cursor(&query) {
        Ok(c) => c,
        Err(p) => return p.instance("/v1/incidents").request_id(request_id).into_response(),
    };
    match state.ledger.list_incidents(query.limit, cursor) {
        Ok(page) => Json(page).into_response(),
        Err(e) => ledger_problem(e, "/v1/incidents", &request_id).into_response(),
    }
}

/// `GET /timeline?limit=&cursor=` or `?incident_id=…`
pub async fn timeline(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(query): Query<PageQuery>,
) -> Response {
    if let Some(incident_id) = &query.incident_id {
        return match state.ledger.incident_timeline(incident_id, query.limit) {
            Ok(items) => Json(json!({
                "items": items,
                "incident_id": incident_id,
                "has_more": false,
                "limit": query.limit.unwrap_or(flowforge_ledger::DEFAULT_PAGE_LIMIT),
            }))
            .into_response(),
            Err(e) => ledger_problem(e, "/v1/timeline", &request_id).into_response(),
        };
    }
    let cursor = match effective_cursor(&query) {
        Ok(c) => c,
        Err(p) => return p.instance("/v1/timeline").request_id(request_id).into_response(),
    };
    match state.ledger.timeline_page(query.limit, cursor) {
        Ok(page) => Json(page).into_response(),
        Err(e) => ledger_problem(e, "/v1/timeline", &request_id).into_response(),
    }
}
