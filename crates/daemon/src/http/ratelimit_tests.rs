use super::*;

fn ip(last: u8) -> IpAddr {
    IpAddr::from([127, 0, 0, last])
}

#[test]
fn requests_under_the_window_pass() {
    let limiter = RateLimiter::new(5, Duration::from_secs(60));
    let now = Instant::now();
    for _ in 0..5 {
        assert_eq!(limiter.check(ip(1), now), Gate::Allowed);
    }
    assert_eq!(limiter.check(ip(1), now), Gate::Limited);
}

#[test]
fn window_resets_after_a_minute() {
    let limiter = RateLimiter::new(1, Duration::from_secs(60));
    let t0 = Instant::now();
    assert_eq!(limiter.check(ip(1), t0), Gate::Allowed);
    assert_eq!(limiter.check(ip(1), t0), Gate::Limited);
    assert_eq!(
        limiter.check(ip(1), t0 + Duration::from_secs(61)),
        Gate::Allowed
    );
}

#[test]
fn clients_are_independent() {
    let limiter = RateLimiter::new(1, Duration::from_secs(60));
    let now = Instant::now();
    assert_eq!(limiter.check(ip(1), now), Gate::Allowed);
    assert_eq!(limiter.check(ip(2), now), Gate::Allowed);
}

#[test]
fn eleven_auth_failures_block_the_twelfth_request() {
    // wrong bearer 11 times from one IP, the 12th response is the block
    let limiter = RateLimiter::new(100, Duration::from_secs(60));
    let now = Instant::now();
    for _ in 0..10 {
        limiter.record_auth_failure(ip(9), now);
        assert_eq!(limiter.check(ip(9), now), Gate::Allowed);
    }
    limiter.record_auth_failure(ip(9), now);
    assert!(matches!(
        limiter.check(ip(9), now),
        Gate::AuthBlocked { .. }
    ));
}

#[test]
fn auth_block_expires() {
    let limiter = RateLimiter::new(100, Duration::from_millis(100));
    let t0 = Instant::now();
    for _ in 0..MAX_AUTH_FAILURES {
        limiter.record_auth_failure(ip(9), t0);
    }
    assert!(matches!(limiter.check(ip(9), t0), Gate::AuthBlocked { .. }));
    assert_eq!(
        limiter.check(ip(9), t0 + Duration::from_millis(150)),
        Gate::Allowed
    );
}

#[test]
fn auth_success_clears_the_streak() {
    let limiter = RateLimiter::new(100, Duration::from_secs(60));
    let now = Instant::now();
    for _ in 0..10 {
        limiter.record_auth_failure(ip(9), now);
    }
    limiter.record_auth_success(ip(9));
    for _ in 0..10 {
        limiter.record_auth_failure(ip(9), now);
    }
    // streak restarted, still under the threshold
    assert_eq!(limiter.check(ip(9), now), Gate::Allowed);
}

#[test]
fn stale_entries_are_pruned() {
    let limiter = RateLimiter::new(100, Duration::from_secs(60));
    let t0 = Instant::now();
    for i in 0..100u8 {
        limiter.check(ip(i), t0);
    }
    assert_eq!(limiter.tracked(), 100);
    // far in the future, any check sweeps the stale map
    limiter.check(ip(200), t0 + Duration::from_secs(600));
    assert_eq!(limiter.tracked(), 1);
}

#[test]
fn blocked_entries_survive_pruning() {
    let limiter = RateLimiter::new(100, Duration::from_secs(3_600));
    let t0 = Instant::now();
    for _ in 0..MAX_AUTH_FAILURES {
        limiter.record_auth_failure(ip(9), t0);
    }
    limiter.check(ip(200), t0 + Duration::from_secs(200));
    assert!(matches!(
        limiter.check(ip(9), t0 + Duration::from_secs(201)),
        Gate::AuthBlocked { .. }
    ));
}
