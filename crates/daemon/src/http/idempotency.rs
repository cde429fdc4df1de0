//! Idempotency middleware for unsafe methods.
//!
//! The key is hashed before it touches storage; the fingerprint is a hash of
//! the canonical request body. In-flight mutations for the same
//! `(scope, key_hash)` serialize behind a per-key async lock, so the first
//! request executes and racers observe the stored replay.

use super::middleware::{
    buffer_response, is_unsafe_method, rebuild_response, request_id_of,
};
use super::problem::Problem;
use super::AppState;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use flowforge_core::Clock;
use flowforge_ledger::{fingerprint, hash_key, IdempotencyOutcome, LedgerError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Largest body the idempotency layer will buffer.
const MAX_BODY_BYTES: usize = 1 << 20;

/// Per-key async locks serializing concurrent identical mutations.
#[derive(Default)]
pub struct InFlightKeys {
    locks: Mutex<HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl InFlightKeys {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, scope: &str, key_hash: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        // drop released slots opportunistically to bound the map
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry((scope.to_string(), key_hash.to_string()))
            .or_default()
            .clone()
    }
}

/// Scope string for a request: method plus the canonical (un-versioned) path.
fn scope_of(req: &Request) -> String {
    let path = req.uri().path();
    let canonical = path.strip_prefix("/v1").unwrap_or(path);
    format!("{} {}", req.method(), canonical)
}

pub async fn idempotency(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if !is_unsafe_method(req.method()) {
        return next.run(req).await;
    }
    let Some(raw_key) = req
        .headers()
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
    else {
        // mutation without a key: no replay semantics requested
        return next.run(req).await;
    };

    let request_id = request_id_of(&req);
    let scope = scope_of(&req);
    let instance = req.uri().path().to_string();

    let (parts, body) = req.into_parts();
    let body_bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return Problem::validation("request body too large for idempotent replay")
                .instance(instance)
                .request_id(request_id)
                .into_response()
        }
    };
    let fp = fingerprint(&body_bytes);
    let now = state.clock.now_rfc3339();

    // Serialize all in-flight mutations for this (scope, key).
    let slot = state.idempotency.slot(&scope, &hash_key(&raw_key));
    let _guard = slot.lock().await;

    match state.ledger.get_idempotency_record(&scope, &raw_key) {
        Ok(Some(_)) => {
            // Completed before: bump counters and resolve replay vs conflict.
            match state
                .ledger
                .record_idempotent(&scope, &raw_key, &fp, 0, "", &now)
            {
                Ok(IdempotencyOutcome::Replayed(record)) => {
                    let status = StatusCode::from_u16(record.status_code)
                        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                    let mut response =
                        (status, record.response_body).into_response();
                    response.headers_mut().insert(
                        header::CONTENT_TYPE,
                        HeaderValue::from_static("application/json"),
                    );
                    response
                        .headers_mut()
                        .insert("idempotency-replayed", HeaderValue::from_static("true"));
                    return response;
                }
                Ok(IdempotencyOutcome::Inserted) => {
                    // record disappeared between lookup and bump; fall through
                }
                Err(LedgerError::IdempotencyConflict) => {
                    return Problem::idempotency_conflict()
                        .instance(instance)
                        .request_id(request_id)
                        .into_response();
                }
                Err(e) => {
                    return Problem::internal(e.to_string())
                        .instance(instance)
                        .request_id(request_id)
                        .into_response();
                }
            }
        }
        Ok(None) => {}
        Err(e) => {
            return Problem::internal(e.to_string())
                .instance(instance)
                .request_id(request_id)
                .into_response();
        }
    }

    // First execution: run the handler with the buffered body, then persist
    // the exact response for future replays.
    let req = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(req).await;
    let (resp_parts, resp_bytes) = buffer_response(response).await;

    let status = resp_parts.status.as_u16();
    if resp_parts.status.is_success() || resp_parts.status.is_client_error() {
        let body_str = String::from_utf8_lossy(&resp_bytes);
        if let Err(e) = state
            .ledger
            .record_idempotent(&scope, &raw_key, &fp, status, &body_str, &now)
        {
            tracing::error!(error = %e, scope, "idempotency record failed");
        }
    }
    rebuild_response(resp_parts, resp_bytes)
}

#[cfg(test)]
#[path = "idempotency_tests.rs"]
mod tests;
