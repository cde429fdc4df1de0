use super::*;

#[yare::parameterized(
    post = { Method::POST, true },
    put = { Method::PUT, true },
    patch = { Method::PATCH, true },
    delete = { Method::DELETE, true },
    get = { Method::GET, false },
    head = { Method::HEAD, false },
    options = { Method::OPTIONS, false },
)]
fn unsafe_method_classification(method: Method, expected: bool) {
    assert_eq!(is_unsafe_method(&method), expected);
}

#[yare::parameterized(
    localhost = { "http://localhost:3000", true },
    loopback = { "http://127.0.0.1:8080", true },
    https_local = { "https://localhost", true },
    bare = { "localhost", true },
    public = { "https://evil.example.com", false },
    lookalike = { "http://localhost.evil.com", false },
)]
fn local_origin_allowlist(origin: &str, expected: bool) {
    assert_eq!(is_local_origin(origin, None), expected);
}

#[test]
fn configured_override_origin_is_allowed() {
    assert!(is_local_origin(
        "http://dashboard.internal:9000",
        Some("http://dashboard.internal:9000")
    ));
    assert!(!is_local_origin("http://dashboard.internal:9001", Some("http://dashboard.internal:9000")));
}

#[test]
fn token_comparison_is_exact() {
    assert!(token_matches("sekret", "sekret"));
    assert!(!token_matches("sekret", "sekret2"));
    assert!(!token_matches("", "sekret"));
    assert!(token_matches("", ""));
}

#[test]
fn client_ip_falls_back_to_loopback() {
    let req = Request::builder().body(Body::empty()).unwrap();
    assert_eq!(client_ip(&req), IpAddr::from([127, 0, 0, 1]));
}

#[test]
fn client_ip_reads_forwarded_header() {
    let req = Request::builder()
        .header("x-forwarded-for", "10.0.0.9, 192.168.0.1")
        .body(Body::empty())
        .unwrap();
    assert_eq!(client_ip(&req), IpAddr::from([10, 0, 0, 9]));
}
