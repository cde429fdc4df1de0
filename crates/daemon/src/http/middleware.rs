//! Middleware chain (outer to inner): request-id → CORS → rate limit → auth
//! → idempotency → handler → metrics counter.

use super::ratelimit::Gate;
use super::problem::Problem;
use super::AppState;
use axum::body::Body;
use axum::extract::{MatchedPath, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use std::net::IpAddr;
use std::time::Instant;

/// Request id attached to every request and response.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Fixed fallback origin when the caller's origin is not local.
const DEFAULT_ORIGIN: &str = "http://127.0.0.1";

/// Whether a method can mutate state.
pub fn is_unsafe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Resolve the client IP: connection info when present, then the first
/// `X-Forwarded-For` hop, then loopback.
pub fn client_ip(req: &Request) -> IpAddr {
    if let Some(info) = req
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
    {
        return info.0.ip();
    }
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_else(|| IpAddr::from([127, 0, 0, 1]))
}

/// Request id for a request that already passed through [`request_id`].
pub fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_default()
}

/// Outermost: take the caller's `X-Request-Id` or mint one, stamp it on the
/// request extensions and the response header.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(|v| v.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    req.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

fn is_local_origin(origin: &str, extra: Option<&str>) -> bool {
    if Some(origin) == extra {
        return true;
    }
    let host = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
        .unwrap_or(origin);
    let host = host.split(':').next().unwrap_or(host);
    host == "localhost" || host == "127.0.0.1"
}

/// CORS for local origins only. The allow-origin echoes the caller when it is
/// on the allowlist, otherwise a fixed local default, never `*`.
pub async fn cors(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    let allow = match origin.as_deref() {
        Some(o) if is_local_origin(o, state.config.allowed_origin.as_deref()) => o.to_string(),
        _ => DEFAULT_ORIGIN.to_string(),
    };

    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&allow) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Authorization, Content-Type, Idempotency-Key, X-Request-Id"),
    );
    response
}

/// Per-client-IP token window plus the auth-failure block.
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let ip = client_ip(&req);
    let request_id = request_id_of(&req);
    let instance = req.uri().path().to_string();
    match state.ratelimit.check(ip, Instant::now()) {
        Gate::Allowed => next.run(req).await,
        Gate::Limited => Problem::rate_limited()
            .instance(instance)
            .request_id(request_id)
            .into_response(),
        Gate::AuthBlocked { retry_after } => {
            Problem::auth_rate_limited(retry_after.as_secs().max(1))
                .instance(instance)
                .request_id(request_id)
                .into_response()
        }
    }
}

/// Constant-time bearer comparison via fixed-size digests.
fn token_matches(provided: &str, expected: &str) -> bool {
    let a: [u8; 32] = Sha256::digest(provided.as_bytes()).into();
    let b: [u8; 32] = Sha256::digest(expected.as_bytes()).into();
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Bearer auth on unsafe methods. With no key configured every unsafe method
/// gets one stable forbidden response; safe methods always pass.
pub async fn auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !is_unsafe_method(req.method()) {
        return next.run(req).await;
    }
    let request_id = request_id_of(&req);
    let instance = req.uri().path().to_string();

    let Some(expected) = state.config.api_key.as_deref() else {
        return Problem::forbidden()
            .instance(instance)
            .request_id(request_id)
            .into_response();
    };

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let ip = client_ip(&req);
    match provided {
        Some(token) if token_matches(token, expected) => {
            state.ratelimit.record_auth_success(ip);
            next.run(req).await
        }
        _ => {
            state.ratelimit.record_auth_failure(ip, Instant::now());
            Problem::unauthorized()
                .instance(instance)
                .request_id(request_id)
                .into_response()
        }
    }
}

/// Innermost: count the request once the handler produced a response.
pub async fn count_request(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let response = next.run(req).await;
    state
        .metrics
        .http_request(&method, &route, response.status().as_u16());
    response
}

/// Buffer an entire response body so it can be persisted or replayed.
pub async fn buffer_response(response: Response) -> (axum::http::response::Parts, axum::body::Bytes) {
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    (parts, bytes)
}

/// Rebuild a response from buffered parts.
pub fn rebuild_response(parts: axum::http::response::Parts, bytes: axum::body::Bytes) -> Response {
    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
#[path = "middleware_tests.rs"]
mod tests;
