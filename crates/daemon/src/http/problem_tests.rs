use super::*;

#[test]
fn type_uri_carries_the_slug() {
    let problem = Problem::idempotency_conflict();
    assert_eq!(
        problem.type_uri,
        "https://flowforge.dev/problems/idempotency-conflict"
    );
    assert_eq!(problem.status, 409);
}

#[yare::parameterized(
    forbidden = { Problem::forbidden(), 403, "forbidden" },
    unauthorized = { Problem::unauthorized(), 401, "unauthorized" },
    rate_limited = { Problem::rate_limited(), 429, "rate-limited" },
    auth_rate_limited = { Problem::auth_rate_limited(30), 429, "auth-rate-limited" },
    budget = { Problem::restart_budget_exceeded(51), 429, "restart-budget-exceeded" },
    validation = { Problem::validation("bad limit"), 400, "validation" },
    not_found = { Problem::not_found("x"), 404, "not-found" },
    wrong_state = { Problem::wrong_state("x"), 409, "wrong-state" },
    unavailable = { Problem::unavailable("x"), 503, "unavailable" },
    internal = { Problem::internal("x"), 500, "internal" },
)]
fn builders_set_status_and_slug(problem: Problem, status: u16, slug: &str) {
    assert_eq!(problem.status, status);
    assert!(problem.type_uri.ends_with(slug), "{}", problem.type_uri);
}

#[test]
fn retry_after_round_trips_to_header() {
    let response = Problem::restart_budget_exceeded(51)
        .request_id("req-1")
        .into_response();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response.headers().get(header::RETRY_AFTER).unwrap(),
        "51"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/problem+json"
    );
}

#[test]
fn serialization_omits_absent_retry_after() {
    let json = serde_json::to_value(Problem::forbidden().request_id("req-2")).unwrap();
    assert!(json.get("retry_after_seconds").is_none());
    assert_eq!(json["request_id"], "req-2");
    assert_eq!(json["title"], "Forbidden");
}

#[test]
fn from_error_kind_maps_budget_with_retry() {
    let problem = Problem::from_error_kind(ErrorKind::BudgetExceeded, Some(42));
    assert_eq!(problem.retry_after_seconds, Some(42));
    assert!(problem.type_uri.ends_with("restart-budget-exceeded"));

    let problem = Problem::from_error_kind(ErrorKind::Unavailable, None);
    assert_eq!(problem.status, 503);
}
