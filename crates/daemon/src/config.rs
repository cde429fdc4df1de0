//! Resolved daemon configuration, assembled once at startup from the
//! environment and handed to the composition root.

use crate::env;
use flowforge_core::{PolicyLimits, Redactor};
use flowforge_ledger::ColumnCipher;
use flowforge_policy::BaselineConfig;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine state directory (set FLOWFORGE_STATE_DIR or HOME)")]
    NoStateDir,

    #[error(
        "no FLOWFORGE_MASTER_KEY configured and plaintext not allowed; \
         set FLOWFORGE_ALLOW_PLAINTEXT=1 to run without ledger encryption"
    )]
    PlaintextNotAllowed,

    #[error("invalid FLOWFORGE_MASTER_KEY: {0}")]
    BadMasterKey(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_host: String,
    pub port: u16,
    pub api_key: Option<String>,
    pub allowed_origin: Option<String>,
    pub state_dir: PathBuf,
    pub db_path: PathBuf,
    pub log_path: PathBuf,
    pub pid_path: PathBuf,
    pub lock_path: PathBuf,
    pub policy_limits: PolicyLimits,
    pub baseline: BaselineConfig,
    pub restart_window: Duration,
    pub restart_max: u32,
    pub stop_timeout: Duration,
    pub monitor_interval: Duration,
    pub rate_limit_per_minute: u32,
    pub auth_block_duration: Duration,
    pub cloud: env::CloudProbes,
    pub safety: env::SafetyLimits,
    pub encrypted: bool,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let state_dir = env::state_dir()?;
        let db_path = env::db_path().unwrap_or_else(|| state_dir.join("ledger.db"));
        Ok(Self {
            bind_host: env::bind_host(),
            port: env::port(),
            api_key: env::api_key(),
            allowed_origin: env::allowed_origin(),
            db_path,
            log_path: state_dir.join("daemon.log"),
            pid_path: state_dir.join("daemon.pid"),
            lock_path: state_dir.join("daemon.lock"),
            state_dir,
            policy_limits: env::policy_limits(),
            baseline: env::baseline_config(),
            restart_window: env::restart_window(),
            restart_max: env::restart_max(),
            stop_timeout: env::stop_timeout(),
            monitor_interval: env::monitor_interval(),
            rate_limit_per_minute: env::rate_limit_per_minute(),
            auth_block_duration: env::auth_block_duration(),
            cloud: env::cloud_probes(),
            safety: env::safety_limits(),
            encrypted: env::master_key().is_some(),
        })
    }

    /// Build the column cipher: master key when configured, otherwise the
    /// explicit plaintext policy (refused without the opt-in flag).
    pub fn cipher(&self) -> Result<ColumnCipher, ConfigError> {
        match env::master_key() {
            Some(key) => ColumnCipher::from_master_key(&key)
                .map_err(|e| ConfigError::BadMasterKey(e.to_string())),
            None if env::allow_plaintext() => Ok(ColumnCipher::plaintext()),
            None => Err(ConfigError::PlaintextNotAllowed),
        }
    }

    /// Redactor with the built-in catalog plus operator-supplied patterns.
    pub fn redactor(&self) -> Redactor {
        let extra = env::extra_redaction_patterns();
        if extra.is_empty() {
            Redactor::new()
        } else {
            Redactor::with_patterns(extra)
        }
    }

    /// Address the control plane binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
