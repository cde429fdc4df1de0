//! RFC 7807 problem documents. Every error response on the control plane is
//! one of these, and every one carries the request id.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use flowforge_core::ErrorKind;
use serde::{Deserialize, Serialize};

/// Base URI for problem types.
pub const PROBLEM_BASE: &str = "https://flowforge.dev/problems";

/// RFC 7807 problem+json body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_uri: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl Problem {
    pub fn new(slug: &str, title: &str, status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            type_uri: format!("{PROBLEM_BASE}/{slug}"),
            title: title.to_string(),
            status: status.as_u16(),
            detail: detail.into(),
            instance: String::new(),
            request_id: String::new(),
            retry_after_seconds: None,
        }
    }

    pub fn instance(mut self, uri: impl Into<String>) -> Self {
        self.instance = uri.into();
        self
    }

    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = id.into();
        self
    }

    pub fn retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_seconds = Some(seconds);
        self
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        Self::new("validation", "Invalid request", StatusCode::BAD_REQUEST, detail)
    }

    pub fn forbidden() -> Self {
        Self::new(
            "forbidden",
            "Forbidden",
            StatusCode::FORBIDDEN,
            "mutations are disabled until an API key is configured",
        )
    }

    pub fn unauthorized() -> Self {
        Self::new(
            "unauthorized",
            "Unauthorized",
            StatusCode::UNAUTHORIZED,
            "missing or invalid bearer token",
        )
    }

    pub fn rate_limited() -> Self {
        Self::new(
            "rate-limited",
            "Too many requests",
            StatusCode::TOO_MANY_REQUESTS,
            "per-client request budget exhausted",
        )
    }

    pub fn auth_rate_limited(retry_after: u64) -> Self {
        Self::new(
            "auth-rate-limited",
            "Too many failed authentications",
            StatusCode::TOO_MANY_REQUESTS,
            "client blocked after repeated authentication failures",
        )
        .retry_after(retry_after)
    }

    pub fn idempotency_conflict() -> Self {
        Self::new(
            "idempotency-conflict",
            "Idempotency key conflict",
            StatusCode::CONFLICT,
            "idempotency key was already used with a different request body",
        )
    }

    pub fn restart_budget_exceeded(retry_after: u64) -> Self {
        Self::new(
            "restart-budget-exceeded",
            "Restart budget exceeded",
            StatusCode::TOO_MANY_REQUESTS,
            "too many restarts inside the sliding window",
        )
        .retry_after(retry_after)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new("not-found", "Not found", StatusCode::NOT_FOUND, detail)
    }

    pub fn wrong_state(detail: impl Into<String>) -> Self {
        Self::new("wrong-state", "Wrong lifecycle state", StatusCode::CONFLICT, detail)
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::new(
            "unavailable",
            "Service unavailable",
            StatusCode::SERVICE_UNAVAILABLE,
            detail,
        )
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            "internal",
            "Internal error",
            StatusCode::INTERNAL_SERVER_ERROR,
            detail,
        )
    }

    pub fn replay_mismatch(detail: impl Into<String>) -> Self {
        Self::new(
            "replay-mismatch",
            "Replay verification failed",
            StatusCode::CONFLICT,
            detail,
        )
    }

    /// Map a lifecycle rejection kind onto the matching problem.
    pub fn from_error_kind(kind: ErrorKind, retry_after: Option<u64>) -> Self {
        match kind {
            ErrorKind::Validation => Self::validation("rejected by lifecycle validation"),
            ErrorKind::Unauthorized => Self::unauthorized(),
            ErrorKind::Forbidden => Self::forbidden(),
            ErrorKind::Conflict => Self::idempotency_conflict(),
            ErrorKind::RateLimited => Self::rate_limited(),
            ErrorKind::NotFound => Self::not_found("resource not found"),
            ErrorKind::BudgetExceeded => {
                Self::restart_budget_exceeded(retry_after.unwrap_or(1))
            }
            ErrorKind::WrongState => Self::wrong_state("lifecycle refused the transition"),
            ErrorKind::Unavailable => Self::unavailable("lifecycle manager is shutting down"),
            ErrorKind::Internal => Self::internal("unclassified control-plane failure"),
        }
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let retry_after = self.retry_after_seconds;
        let body = serde_json::to_string(&self).unwrap_or_else(|_| "{}".to_string());
        let mut response = (status, body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
#[path = "problem_tests.rs"]
mod tests;
