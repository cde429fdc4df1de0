//! Monitor loop: one ticker-driven task per run. Samples CPU/FD/socket
//! signals and the redacted output window, computes the derived signals,
//! and feeds telemetry to the policy engine. Policy failures are logged and
//! counted, never allowed to take the supervisor down.

pub mod sampler;
pub mod signals;

use crate::env::SafetyLimits;
use crate::lifecycle::{LifecycleHandle, TelemetryStamp};
use flowforge_core::{Clock, PolicyLimits, Telemetry};
use flowforge_policy::decide;
use flowforge_supervisor::Supervisor;
use sampler::ProcSampler;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Output lines considered per tick.
const OUTPUT_WINDOW: usize = 10;

/// Rate gate: at most one identical emission per window.
#[derive(Debug)]
pub struct AlertGate {
    window: Duration,
    last: HashMap<String, Instant>,
}

impl AlertGate {
    pub fn new(window: Duration) -> Self {
        Self { window, last: HashMap::new() }
    }

    /// Whether `key` may fire at `now`; records the emission when allowed.
    pub fn allow(&mut self, key: &str, now: Instant) -> bool {
        match self.last.get(key) {
            Some(&prev) if now.duration_since(prev) < self.window => false,
            _ => {
                self.last.insert(key.to_string(), now);
                // amortized prune of stale entries
                let window = self.window;
                self.last.retain(|_, &mut t| now.duration_since(t) < window * 4);
                true
            }
        }
    }
}

/// Ticker-driven monitor for the supervised child.
pub struct Monitor<C: Clock> {
    pub supervisor: Supervisor,
    pub lifecycle: LifecycleHandle,
    pub limits: PolicyLimits,
    pub safety: SafetyLimits,
    pub interval: Duration,
    pub clock: C,
}

/// Check a sample against the hard resource ceilings. Returns the breach
/// description when a ceiling is crossed; a ceiling of 0 is disabled.
pub fn safety_breach(limits: &SafetyLimits, sample: &sampler::ResourceSample) -> Option<String> {
    if limits.max_fd_count > 0 && sample.fd_count > limits.max_fd_count {
        return Some(format!(
            "open file descriptors {} exceed the ceiling of {}",
            sample.fd_count, limits.max_fd_count
        ));
    }
    if limits.max_socket_count > 0 && sample.socket_count > limits.max_socket_count {
        return Some(format!(
            "open sockets {} exceed the ceiling of {}",
            sample.socket_count, limits.max_socket_count
        ));
    }
    None
}

impl<C: Clock + 'static> Monitor<C> {
    /// Spawn the loop; it cooperatively stops when `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut state = TickState::new(self.limits.cpu_window);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick(&mut state),
                _ = cancel.cancelled() => break,
            }
        }
        tracing::debug!("monitor loop stopped");
    }

    fn tick(&self, state: &mut TickState) {
        let Some(pid) = self.supervisor.pid() else {
            state.reset();
            return;
        };
        if state.sampler.as_ref().map(ProcSampler::pid) != Some(pid) {
            state.sampler = Some(ProcSampler::new(pid));
            state.cpu_over_since = None;
        }
        let Some(sample) = state.sampler.as_mut().and_then(ProcSampler::sample) else {
            return;
        };

        let now = self.clock.now();
        // Hard ceilings pre-empt policy evaluation for this tick.
        if let Some(reason) = safety_breach(&self.safety, &sample) {
            if state.gate.allow("SAFETY", now) {
                self.lifecycle
                    .enact_safety_stop(reason, sample.fd_count, sample.socket_count);
            }
            return;
        }
        let cpu_over_for = if sample.cpu_percent >= self.limits.max_cpu_percent {
            let since = *state.cpu_over_since.get_or_insert(now);
            now.duration_since(since)
        } else {
            state.cpu_over_since = None;
            Duration::ZERO
        };

        let lines = self.supervisor.output().last(OUTPUT_WINDOW);
        let telemetry = Telemetry {
            cpu_percent: sample.cpu_percent,
            cpu_over_for,
            log_repetition: signals::repetition_ratio(&lines),
            log_entropy: signals::shannon_entropy(&lines),
            raw_diversity: signals::raw_diversity(&lines),
            progress_like: signals::progress_like(&lines),
        };
        tracing::trace!(
            pid,
            cpu = telemetry.cpu_percent,
            fds = sample.fd_count,
            sockets = sample.socket_count,
            repetition = telemetry.log_repetition,
            "monitor tick"
        );

        let decision = decide(&telemetry, &self.limits);
        self.lifecycle.stamp_telemetry(TelemetryStamp {
            cpu_percent: telemetry.cpu_percent,
            last_output_line: lines.last().cloned().unwrap_or_default(),
            cpu_score: decision.cpu_score,
            entropy_score: decision.entropy_score,
            confidence_score: decision.confidence_score,
        });

        if state.gate.allow(&gate_key(&decision), now) {
            self.lifecycle.enact_policy(decision, telemetry);
        }
    }
}

/// De-duplication key for a decision: the action plus the stable prefix of
/// the reason (numbers vary tick to tick and must not defeat the gate).
fn gate_key(decision: &flowforge_core::PolicyDecision) -> String {
    let prefix: String = decision
        .reason
        .chars()
        .take_while(|c| !c.is_ascii_digit())
        .collect();
    format!("{}:{}", decision.action, prefix.trim())
}

struct TickState {
    sampler: Option<ProcSampler>,
    cpu_over_since: Option<Instant>,
    gate: AlertGate,
}

impl TickState {
    fn new(window: Duration) -> Self {
        Self {
            sampler: None,
            cpu_over_since: None,
            gate: AlertGate::new(window),
        }
    }

    fn reset(&mut self) {
        self.sampler = None;
        self.cpu_over_since = None;
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
