use super::*;
use serial_test::serial;

fn with_env<R>(pairs: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
    for (k, v) in pairs {
        std::env::set_var(k, v);
    }
    let out = f();
    for (k, _) in pairs {
        std::env::remove_var(k);
    }
    out
}

#[test]
#[serial]
fn bind_host_defaults_to_loopback() {
    std::env::remove_var("FLOWFORGE_BIND_HOST");
    assert_eq!(bind_host(), "127.0.0.1");
}

#[test]
#[serial]
fn non_local_bind_host_is_refused() {
    // boundary behavior: silent fallback to 127.0.0.1
    with_env(&[("FLOWFORGE_BIND_HOST", "0.0.0.0")], || {
        assert_eq!(bind_host(), "127.0.0.1");
    });
    with_env(&[("FLOWFORGE_BIND_HOST", "10.1.2.3")], || {
        assert_eq!(bind_host(), "127.0.0.1");
    });
}

#[test]
#[serial]
fn localhost_bind_host_is_kept() {
    with_env(&[("FLOWFORGE_BIND_HOST", "localhost")], || {
        assert_eq!(bind_host(), "localhost");
    });
}

#[test]
#[serial]
fn state_dir_prefers_explicit_override() {
    with_env(&[("FLOWFORGE_STATE_DIR", "/tmp/ff-state")], || {
        assert_eq!(state_dir().unwrap(), PathBuf::from("/tmp/ff-state"));
    });
}

#[test]
#[serial]
fn baseline_tuning_reads_env_and_clamps() {
    with_env(
        &[
            ("FLOWFORGE_SIGNAL_BASELINE_CPU_DELTA_THRESHOLD", "30"),
            ("FLOWFORGE_SIGNAL_BASELINE_MIN_SAMPLES", "500"),
            ("FLOWFORGE_SIGNAL_BASELINE_REQUIRED_CONSECUTIVE", "50"),
            ("FLOWFORGE_SIGNAL_BASELINE_LIMIT", "9999"),
        ],
        || {
            let cfg = baseline_config();
            assert_eq!(cfg.cpu_delta_threshold, 30.0);
            assert_eq!(cfg.min_baseline_samples, 100); // cap
            assert_eq!(cfg.required_consecutive_breaches, 10); // cap
            assert_eq!(cfg.trace_limit, 5_000); // cap
        },
    );
}

#[test]
#[serial]
fn baseline_defaults() {
    let cfg = baseline_config();
    assert_eq!(cfg.cpu_delta_threshold, 25.0);
    assert_eq!(cfg.entropy_delta_threshold, 20.0);
    assert_eq!(cfg.confidence_delta_threshold, 20.0);
    assert_eq!(cfg.min_baseline_samples, 3);
    assert_eq!(cfg.required_consecutive_breaches, 2);
    assert_eq!(cfg.trace_limit, 500);
}

#[test]
#[serial]
fn policy_limits_read_env() {
    with_env(
        &[("FLOWFORGE_MAX_CPU_PERCENT", "75"), ("FLOWFORGE_CPU_WINDOW_SECS", "20")],
        || {
            let limits = policy_limits();
            assert_eq!(limits.max_cpu_percent, 75.0);
            assert_eq!(limits.cpu_window, Duration::from_secs(20));
        },
    );
}

#[test]
#[serial]
fn safety_limits_default_and_read_env() {
    let defaults = safety_limits();
    assert_eq!(defaults.max_fd_count, 1_024);
    assert_eq!(defaults.max_socket_count, 256);

    with_env(
        &[("FLOWFORGE_MAX_FDS", "64"), ("FLOWFORGE_MAX_SOCKETS", "0")],
        || {
            let limits = safety_limits();
            assert_eq!(limits.max_fd_count, 64);
            // 0 disables the socket ceiling
            assert_eq!(limits.max_socket_count, 0);
        },
    );
}

#[test]
#[serial]
fn cloud_probes_parse() {
    with_env(
        &[
            ("FLOWFORGE_CLOUD_REQUIRED", "true"),
            ("FLOWFORGE_CLOUD_POSTGRES_ADDR", "127.0.0.1:5432"),
            ("FLOWFORGE_CLOUD_PROBE_TIMEOUT_MS", "250"),
        ],
        || {
            let probes = cloud_probes();
            assert!(probes.required);
            assert_eq!(probes.postgres_addr.as_deref(), Some("127.0.0.1:5432"));
            assert_eq!(probes.probe_timeout, Duration::from_millis(250));
            assert!(probes.redis_addr.is_none());
        },
    );
}

#[test]
#[serial]
fn redaction_patterns_split_on_commas() {
    with_env(&[("FLOWFORGE_REDACT_PATTERNS", "foo-[0-9]+, bar\\S+ ,")], || {
        assert_eq!(extra_redaction_patterns(), vec!["foo-[0-9]+", "bar\\S+"]);
    });
}
