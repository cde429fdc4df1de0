//! Centralized environment variable access for the daemon crate.
//!
//! Every `FLOWFORGE_*` variable is read here and nowhere else.

use flowforge_core::PolicyLimits;
use flowforge_policy::BaselineConfig;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::ConfigError;

/// Daemon version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default control-plane port.
pub const DEFAULT_PORT: u16 = 8787;

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn var_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    var(name).and_then(|s| s.parse().ok())
}

/// Resolve state directory:
/// `FLOWFORGE_STATE_DIR` > `XDG_STATE_HOME/flowforge` > `~/.local/state/flowforge`
pub fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = var("FLOWFORGE_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("flowforge"));
    }
    let home = var("HOME").ok_or(ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/flowforge"))
}

/// Bearer token enforcing auth on unsafe methods when set.
pub fn api_key() -> Option<String> {
    var("FLOWFORGE_API_KEY")
}

/// 64-hex master key enabling ledger column encryption.
pub fn master_key() -> Option<String> {
    var("FLOWFORGE_MASTER_KEY")
}

/// Explicit opt-in to plaintext ledger columns when no master key is set.
pub fn allow_plaintext() -> bool {
    matches!(var("FLOWFORGE_ALLOW_PLAINTEXT").as_deref(), Some("1" | "true" | "yes"))
}

/// Bind host, restricted to loopback. Anything else is refused and replaced
/// with `127.0.0.1`.
pub fn bind_host() -> String {
    match var("FLOWFORGE_BIND_HOST") {
        Some(host) if host == "127.0.0.1" || host == "localhost" => host,
        Some(other) => {
            tracing::warn!(requested = %other, "non-local bind host refused, using 127.0.0.1");
            "127.0.0.1".to_string()
        }
        None => "127.0.0.1".to_string(),
    }
}

pub fn port() -> u16 {
    var_parsed("FLOWFORGE_PORT").unwrap_or(DEFAULT_PORT)
}

/// Additional local CORS origin.
pub fn allowed_origin() -> Option<String> {
    var("FLOWFORGE_ALLOWED_ORIGIN")
}

/// Ledger location (default `<state_dir>/ledger.db`).
pub fn db_path() -> Option<PathBuf> {
    var("FLOWFORGE_DB_PATH").map(PathBuf::from)
}

/// Threshold decider limits.
pub fn policy_limits() -> PolicyLimits {
    let mut limits = PolicyLimits::default();
    if let Some(v) = var_parsed("FLOWFORGE_MAX_CPU_PERCENT") {
        limits = limits.max_cpu_percent(v);
    }
    if let Some(v) = var_parsed::<u64>("FLOWFORGE_CPU_WINDOW_SECS") {
        limits = limits.cpu_window(Duration::from_secs(v));
    }
    if let Some(v) = var_parsed("FLOWFORGE_MIN_LOG_ENTROPY") {
        limits = limits.min_log_entropy(v);
    }
    if let Some(v) = var_parsed("FLOWFORGE_MAX_LOG_REPETITION") {
        limits = limits.max_log_repetition(v);
    }
    limits
}

/// Signal-baseline tuning, clamped to the documented caps.
pub fn baseline_config() -> BaselineConfig {
    let defaults = BaselineConfig::default();
    BaselineConfig {
        cpu_delta_threshold: var_parsed("FLOWFORGE_SIGNAL_BASELINE_CPU_DELTA_THRESHOLD")
            .unwrap_or(defaults.cpu_delta_threshold),
        entropy_delta_threshold: var_parsed("FLOWFORGE_SIGNAL_BASELINE_ENTROPY_DELTA_THRESHOLD")
            .unwrap_or(defaults.entropy_delta_threshold),
        confidence_delta_threshold: var_parsed(
            "FLOWFORGE_SIGNAL_BASELINE_CONFIDENCE_DELTA_THRESHOLD",
        )
        .unwrap_or(defaults.confidence_delta_threshold),
        min_baseline_samples: var_parsed("FLOWFORGE_SIGNAL_BASELINE_MIN_SAMPLES")
            .unwrap_or(defaults.min_baseline_samples),
        required_consecutive_breaches: var_parsed(
            "FLOWFORGE_SIGNAL_BASELINE_REQUIRED_CONSECUTIVE",
        )
        .unwrap_or(defaults.required_consecutive_breaches),
        trace_limit: var_parsed("FLOWFORGE_SIGNAL_BASELINE_LIMIT")
            .unwrap_or(defaults.trace_limit),
    }
    .clamped()
}

/// Sliding restart-budget window.
pub fn restart_window() -> Duration {
    Duration::from_secs(var_parsed("FLOWFORGE_RESTART_WINDOW_SECS").unwrap_or(60))
}

/// Maximum accepted restarts inside the window.
pub fn restart_max() -> u32 {
    var_parsed("FLOWFORGE_RESTART_MAX").unwrap_or(3)
}

/// Supervisor stop timeout (also the stop SLO target).
pub fn stop_timeout() -> Duration {
    Duration::from_secs(var_parsed("FLOWFORGE_STOP_TIMEOUT_SECS").unwrap_or(3))
}

/// Monitor sampling interval.
pub fn monitor_interval() -> Duration {
    Duration::from_millis(var_parsed("FLOWFORGE_MONITOR_INTERVAL_MS").unwrap_or(1_000))
}

/// Requests per minute per client IP.
pub fn rate_limit_per_minute() -> u32 {
    var_parsed("FLOWFORGE_RATE_LIMIT_PER_MINUTE").unwrap_or(120)
}

/// Auth brute-force block duration.
pub fn auth_block_duration() -> Duration {
    Duration::from_secs(var_parsed("FLOWFORGE_AUTH_BLOCK_SECS").unwrap_or(60))
}

/// Hard resource ceilings for the supervised child, enforced by the monitor
/// independently of the CPU-window policy. A value of 0 disables that check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyLimits {
    pub max_fd_count: usize,
    pub max_socket_count: usize,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self { max_fd_count: 1_024, max_socket_count: 256 }
    }
}

pub fn safety_limits() -> SafetyLimits {
    let defaults = SafetyLimits::default();
    SafetyLimits {
        max_fd_count: var_parsed("FLOWFORGE_MAX_FDS").unwrap_or(defaults.max_fd_count),
        max_socket_count: var_parsed("FLOWFORGE_MAX_SOCKETS")
            .unwrap_or(defaults.max_socket_count),
    }
}

/// Cloud dependency probes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudProbes {
    pub required: bool,
    pub postgres_addr: Option<String>,
    pub redis_addr: Option<String>,
    pub nats_health_url: Option<String>,
    pub minio_health_url: Option<String>,
    pub probe_timeout: Duration,
}

pub fn cloud_probes() -> CloudProbes {
    CloudProbes {
        required: matches!(var("FLOWFORGE_CLOUD_REQUIRED").as_deref(), Some("1" | "true" | "yes")),
        postgres_addr: var("FLOWFORGE_CLOUD_POSTGRES_ADDR"),
        redis_addr: var("FLOWFORGE_CLOUD_REDIS_ADDR"),
        nats_health_url: var("FLOWFORGE_CLOUD_NATS_HEALTH_URL"),
        minio_health_url: var("FLOWFORGE_CLOUD_MINIO_HEALTH_URL"),
        probe_timeout: Duration::from_millis(
            var_parsed("FLOWFORGE_CLOUD_PROBE_TIMEOUT_MS").unwrap_or(1_500),
        ),
    }
}

/// Extra redaction patterns (comma-separated regexes).
pub fn extra_redaction_patterns() -> Vec<String> {
    var("FLOWFORGE_REDACT_PATTERNS")
        .map(|s| s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
