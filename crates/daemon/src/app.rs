//! Composition root: wire the ledger, supervisor, lifecycle actor, monitor
//! and HTTP state together. Used by the daemon binary and by `flowforge run`
//! (which embeds the whole control plane in-process).

use crate::config::{Config, ConfigError};
use crate::http::{idempotency::InFlightKeys, ratelimit::RateLimiter, AppState};
use crate::lifecycle::{LifecycleHandle, LifecycleManager, RunSpec, SharedProcessState};
use crate::metrics::Metrics;
use crate::monitor::Monitor;
use crate::readiness::Readiness;
use flowforge_core::{ProcessState, Redactor, SystemClock};
use flowforge_ledger::{Ledger, LedgerError};
use flowforge_supervisor::{OutputRing, Supervisor};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Output lines retained for the monitor window and incident patterns.
const OUTPUT_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A fully wired control plane.
pub struct App {
    pub state: AppState,
    pub supervisor: Supervisor,
    pub lifecycle: LifecycleHandle,
    pub monitor_cancel: CancellationToken,
}

impl App {
    /// Build every component and spawn the lifecycle actor and monitor loop.
    pub fn build(config: Config, spec: RunSpec) -> Result<Self, BuildError> {
        let cipher = config.cipher()?;
        let redactor = config.redactor();
        let ledger = Ledger::open(&config.db_path, cipher, redactor.clone())?;
        Self::build_with_ledger(config, spec, ledger, redactor)
    }

    /// Variant for tests and `demo`: caller supplies the ledger.
    pub fn build_with_ledger(
        config: Config,
        spec: RunSpec,
        ledger: Ledger,
        redactor: Redactor,
    ) -> Result<Self, BuildError> {
        let clock = SystemClock;
        let metrics = Arc::new(Metrics::new());
        let process_state: SharedProcessState = Arc::new(Mutex::new(ProcessState::default()));
        let supervisor = Supervisor::new(OutputRing::new(OUTPUT_CAPACITY, redactor));

        let lifecycle = LifecycleManager {
            spec,
            supervisor: supervisor.clone(),
            ledger: ledger.clone(),
            metrics: Arc::clone(&metrics),
            state: Arc::clone(&process_state),
            clock: clock.clone(),
            stop_timeout: config.stop_timeout,
            restart_max: config.restart_max,
            restart_window: config.restart_window,
            baseline: config.baseline.clone(),
            rollout_mode: "enforce".to_string(),
        }
        .spawn();

        let monitor_cancel = CancellationToken::new();
        Monitor {
            supervisor: supervisor.clone(),
            lifecycle: lifecycle.clone(),
            limits: config.policy_limits.clone(),
            safety: config.safety,
            interval: config.monitor_interval,
            clock: clock.clone(),
        }
        .spawn(monitor_cancel.clone());

        let state = AppState {
            ratelimit: Arc::new(RateLimiter::new(
                config.rate_limit_per_minute,
                config.auth_block_duration,
            )),
            readiness: Arc::new(Readiness::new(config.cloud.clone())),
            config: Arc::new(config),
            ledger,
            lifecycle: lifecycle.clone(),
            process_state,
            metrics,
            idempotency: Arc::new(InFlightKeys::new()),
            clock,
        };

        Ok(Self { state, supervisor, lifecycle, monitor_cancel })
    }

    /// The axum router for this app.
    pub fn router(&self) -> axum::Router {
        crate::http::router(self.state.clone())
    }

    /// Stop the monitor, drain the lifecycle actor and tear the child down.
    pub async fn shutdown(&self) {
        self.monitor_cancel.cancel();
        self.lifecycle.shutdown().await;
    }
}
