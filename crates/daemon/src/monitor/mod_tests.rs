use super::*;

#[test]
fn gate_allows_first_emission() {
    let mut gate = AlertGate::new(Duration::from_secs(10));
    let now = Instant::now();
    assert!(gate.allow("ALERT:cpu hot", now));
}

#[test]
fn identical_alerts_are_limited_to_one_per_window() {
    let mut gate = AlertGate::new(Duration::from_secs(10));
    let t0 = Instant::now();
    assert!(gate.allow("ALERT:cpu hot", t0));
    assert!(!gate.allow("ALERT:cpu hot", t0 + Duration::from_secs(5)));
    assert!(!gate.allow("ALERT:cpu hot", t0 + Duration::from_secs(9)));
    assert!(gate.allow("ALERT:cpu hot", t0 + Duration::from_secs(10)));
}

#[test]
fn different_keys_do_not_interfere() {
    let mut gate = AlertGate::new(Duration::from_secs(10));
    let t0 = Instant::now();
    assert!(gate.allow("ALERT:cpu hot", t0));
    assert!(gate.allow("KILL:loop detected", t0));
    assert!(gate.allow("CONTINUE:within limits", t0));
}

fn sample(fd_count: usize, socket_count: usize) -> sampler::ResourceSample {
    sampler::ResourceSample { cpu_percent: 10.0, fd_count, socket_count }
}

#[test]
fn safety_breach_fires_on_fd_ceiling() {
    let limits = SafetyLimits { max_fd_count: 100, max_socket_count: 50 };
    let reason = safety_breach(&limits, &sample(101, 0)).expect("fd breach");
    assert!(reason.contains("file descriptors"), "{reason}");
    assert!(reason.contains("101"), "{reason}");
}

#[test]
fn safety_breach_fires_on_socket_ceiling() {
    let limits = SafetyLimits { max_fd_count: 100, max_socket_count: 50 };
    let reason = safety_breach(&limits, &sample(10, 51)).expect("socket breach");
    assert!(reason.contains("sockets"), "{reason}");
}

#[test]
fn safety_breach_quiet_at_or_under_the_ceiling() {
    let limits = SafetyLimits { max_fd_count: 100, max_socket_count: 50 };
    assert!(safety_breach(&limits, &sample(100, 50)).is_none());
    assert!(safety_breach(&limits, &sample(3, 0)).is_none());
}

#[test]
fn zero_ceiling_disables_the_check() {
    let limits = SafetyLimits { max_fd_count: 0, max_socket_count: 0 };
    assert!(safety_breach(&limits, &sample(1_000_000, 1_000_000)).is_none());
}

#[test]
fn gate_key_is_stable_across_varying_numbers() {
    let decision = |reason: &str| flowforge_core::PolicyDecision {
        action: flowforge_core::DecisionAction::Alert,
        reason: reason.to_string(),
        cpu_score: 0.0,
        entropy_score: 0.0,
        confidence_score: 0.0,
    };
    let a = gate_key(&decision("cpu=96.0% >= 90.0% for 15s, output still varied"));
    let b = gate_key(&decision("cpu=97.3% >= 90.0% for 16s, output still varied"));
    assert_eq!(a, b, "numeric churn must not defeat the gate");

    let c = gate_key(&decision("within limits"));
    assert_ne!(a, c);
}

#[test]
fn stale_entries_are_pruned() {
    let mut gate = AlertGate::new(Duration::from_millis(10));
    let t0 = Instant::now();
    for i in 0..100 {
        gate.allow(&format!("key-{i}"), t0);
    }
    // an allow far past the retention horizon sweeps the stale keys
    assert!(gate.allow("fresh", t0 + Duration::from_secs(5)));
    assert!(gate.last.len() < 100, "prune did not run: {}", gate.last.len());
}
