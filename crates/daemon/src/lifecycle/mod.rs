//! Lifecycle manager: a single-consumer actor serializing every control-plane
//! transition.
//!
//! External callers await a reply on a per-request channel, so concurrent
//! identical requests collapse into `IN_PROGRESS` and completed ones replay.
//! Every accepted transition is audited with the originating request id
//! before the caller sees the reply; if the audit cannot be appended the
//! action is rolled back and the caller gets an internal rejection.

pub mod budget;

use crate::baseline;
use crate::metrics::Metrics;
use budget::{BackoffTracker, BudgetCheck, RestartBudget, RestartClass};
use flowforge_core::{
    AuditAction, Clock, CommandStatus, DecisionAction, ErrorKind, LifecycleDecision,
    LifecyclePhase, PolicyDecision, ProcessState, RunId, Telemetry, WorkerStatus,
};
use flowforge_ledger::{Ledger, NewAudit, NewDecisionTrace, NewIncident};
use flowforge_policy::{BaselineConfig, TraceContext};
use flowforge_supervisor::{ChildExit, Supervisor};
use parking_lot::Mutex;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Shared, single-writer process state. Readers take deep-copy snapshots.
pub type SharedProcessState = Arc<Mutex<ProcessState>>;

/// The command the daemon supervises.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

/// Caller context carried into audits.
#[derive(Debug, Clone)]
pub struct CommandCtx {
    pub actor: String,
    pub reason: String,
    pub source: String,
    pub request_id: Option<String>,
}

impl CommandCtx {
    pub fn operator(reason: impl Into<String>, request_id: Option<String>) -> Self {
        Self {
            actor: "operator".into(),
            reason: reason.into(),
            source: "http".into(),
            request_id,
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self {
            actor: "daemon".into(),
            reason: reason.into(),
            source: "daemon".into(),
            request_id: None,
        }
    }
}

/// Telemetry stamp from the monitor (single-writer discipline: the actor is
/// the only task mutating [`ProcessState`]).
#[derive(Debug, Clone)]
pub struct TelemetryStamp {
    pub cpu_percent: f64,
    pub last_output_line: String,
    pub cpu_score: f64,
    pub entropy_score: f64,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Start,
    Stop,
    Restart,
}

enum Msg {
    Start {
        ctx: CommandCtx,
        reply: oneshot::Sender<LifecycleDecision>,
    },
    Stop {
        ctx: CommandCtx,
        reply: oneshot::Sender<LifecycleDecision>,
    },
    Restart {
        ctx: CommandCtx,
        reply: oneshot::Sender<LifecycleDecision>,
    },
    EnactPolicy {
        decision: PolicyDecision,
        telemetry: Telemetry,
    },
    SafetyLimit {
        reason: String,
        fd_count: usize,
        socket_count: usize,
    },
    Telemetry(TelemetryStamp),
    ChildExited {
        generation: u64,
        exit: ChildExit,
    },
    StopFinished {
        op: OpKind,
        ctx: CommandCtx,
        clean: bool,
        final_status: WorkerStatus,
        restart_class: Option<RestartClass>,
        started: std::time::Instant,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to the lifecycle mailbox.
#[derive(Clone)]
pub struct LifecycleHandle {
    tx: mpsc::Sender<Msg>,
}

impl LifecycleHandle {
    async fn request(
        &self,
        make: impl FnOnce(oneshot::Sender<LifecycleDecision>) -> Msg,
    ) -> LifecycleDecision {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(make(reply_tx)).await.is_err() {
            return unavailable();
        }
        reply_rx.await.unwrap_or_else(|_| unavailable())
    }

    pub async fn request_start(&self, ctx: CommandCtx) -> LifecycleDecision {
        self.request(|reply| Msg::Start { ctx, reply }).await
    }

    pub async fn request_stop(&self, ctx: CommandCtx) -> LifecycleDecision {
        self.request(|reply| Msg::Stop { ctx, reply }).await
    }

    pub async fn request_restart(&self, ctx: CommandCtx) -> LifecycleDecision {
        self.request(|reply| Msg::Restart { ctx, reply }).await
    }

    /// Fire-and-forget policy enactment from the monitor.
    pub fn enact_policy(&self, decision: PolicyDecision, telemetry: Telemetry) {
        let _ = self.tx.try_send(Msg::EnactPolicy { decision, telemetry });
    }

    /// Fire-and-forget hard-ceiling stop from the monitor (fd/socket limits).
    pub fn enact_safety_stop(&self, reason: String, fd_count: usize, socket_count: usize) {
        let _ = self
            .tx
            .try_send(Msg::SafetyLimit { reason, fd_count, socket_count });
    }

    /// Fire-and-forget telemetry stamp from the monitor.
    pub fn stamp_telemetry(&self, stamp: TelemetryStamp) {
        let _ = self.tx.try_send(Msg::Telemetry(stamp));
    }

    /// Drain the mailbox and stop the actor. Further requests are refused
    /// with `Unavailable`.
    pub async fn shutdown(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(Msg::Shutdown { reply: reply_tx }).await.is_ok() {
            let _ = reply_rx.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

fn unavailable() -> LifecycleDecision {
    LifecycleDecision::rejected(LifecyclePhase::Stopped, ErrorKind::Unavailable)
}

/// Everything the actor needs, assembled by the composition root.
pub struct LifecycleManager<C: Clock> {
    pub spec: RunSpec,
    pub supervisor: Supervisor,
    pub ledger: Ledger,
    pub metrics: Arc<Metrics>,
    pub state: SharedProcessState,
    pub clock: C,
    pub stop_timeout: Duration,
    pub restart_max: u32,
    pub restart_window: Duration,
    pub baseline: BaselineConfig,
    pub rollout_mode: String,
}

struct Actor<C: Clock> {
    deps: LifecycleManager<C>,
    tx: mpsc::Sender<Msg>,
    phase: LifecyclePhase,
    run_id: RunId,
    generation: u64,
    in_flight: Option<OpKind>,
    budget: RestartBudget,
    backoff: BackoffTracker,
}

impl<C: Clock + 'static> LifecycleManager<C> {
    /// Spawn the actor. The restart budget window is re-seeded from the
    /// ledger so a daemon restart cannot reset it.
    pub fn spawn(self) -> LifecycleHandle {
        let (tx, rx) = mpsc::channel(64);
        let mut budget = RestartBudget::new(self.restart_max, self.restart_window);
        let window_start = self.clock.epoch_ms().saturating_sub(self.restart_window.as_millis() as u64);
        if let Ok(times) = self
            .ledger
            .restart_audit_times_since(&flowforge_core::clock::rfc3339_from_epoch_ms(window_start))
        {
            budget.seed(times.iter().filter_map(|t| parse_rfc3339_ms(t)));
        }

        let actor = Actor {
            tx: tx.clone(),
            phase: LifecyclePhase::Stopped,
            run_id: RunId::new(),
            generation: 0,
            in_flight: None,
            budget,
            backoff: BackoffTracker::default(),
            deps: self,
        };
        tokio::spawn(actor.run(rx));
        LifecycleHandle { tx }
    }
}

fn parse_rfc3339_ms(s: &str) -> Option<u64> {
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp_millis().max(0) as u64)
}

impl<C: Clock + 'static> Actor<C> {
    async fn run(mut self, mut rx: mpsc::Receiver<Msg>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                Msg::Start { ctx, reply } => {
                    let decision = self.handle_start(ctx).await;
                    let _ = reply.send(decision);
                }
                Msg::Stop { ctx, reply } => {
                    let decision =
                        self.handle_stop(ctx, WorkerStatus::UserTerminated, None);
                    let _ = reply.send(decision);
                }
                Msg::Restart { ctx, reply } => {
                    let decision = self.handle_restart(ctx, RestartClass::UserInitiated);
                    let _ = reply.send(decision);
                }
                Msg::EnactPolicy { decision, telemetry } => {
                    self.handle_policy(decision, telemetry).await;
                }
                Msg::SafetyLimit { reason, fd_count, socket_count } => {
                    self.handle_safety_limit(reason, fd_count, socket_count);
                }
                Msg::Telemetry(stamp) => self.stamp_telemetry(stamp),
                Msg::ChildExited { generation, exit } => {
                    self.handle_child_exit(generation, exit);
                }
                Msg::StopFinished {
                    op,
                    ctx,
                    clean,
                    final_status,
                    restart_class,
                    started,
                } => {
                    self.handle_stop_finished(op, ctx, clean, final_status, restart_class, started)
                        .await;
                }
                Msg::Shutdown { reply } => {
                    rx.close();
                    let _ = self.deps.supervisor.stop(self.deps.stop_timeout).await;
                    self.set_phase(LifecyclePhase::Stopped, WorkerStatus::Stopped, "daemon shutdown");
                    let _ = reply.send(());
                    break;
                }
            }
        }
    }

    fn now(&self) -> String {
        self.deps.clock.now_rfc3339()
    }

    fn pid(&self) -> Option<u32> {
        self.deps.supervisor.pid()
    }

    fn set_phase(&mut self, phase: LifecyclePhase, status: WorkerStatus, reason: &str) {
        self.phase = phase;
        let mut state = self.deps.state.lock();
        state.lifecycle = phase;
        state.status = status;
        state.reason = reason.to_string();
        state.pid = self.deps.supervisor.pid();
        state.timestamp_ms = self.deps.clock.epoch_ms();
    }

    fn stamp_telemetry(&mut self, stamp: TelemetryStamp) {
        let mut state = self.deps.state.lock();
        state.cpu_percent = stamp.cpu_percent;
        state.last_output_line = stamp.last_output_line;
        state.cpu_score = stamp.cpu_score;
        state.entropy_score = stamp.entropy_score;
        state.confidence_score = stamp.confidence_score;
        state.timestamp_ms = self.deps.clock.epoch_ms();
    }

    fn audit(&self, ctx: &CommandCtx, action: AuditAction, incident_id: Option<String>) -> bool {
        let audit = NewAudit {
            run_id: self.run_id.to_string(),
            actor: ctx.actor.clone(),
            action: action.to_string(),
            details: ctx.reason.clone(),
            source: ctx.source.clone(),
            pid: self.pid(),
            command: self.command_line(),
            incident_id,
            request_id: ctx.request_id.clone(),
            payload: Default::default(),
        };
        match self.deps.ledger.append_audit(&audit, &self.now()) {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(action = %action, error = %e, "audit append failed");
                false
            }
        }
    }

    fn command_line(&self) -> String {
        let mut parts = vec![self.deps.spec.command.clone()];
        parts.extend(self.deps.spec.args.iter().cloned());
        parts.join(" ")
    }

    async fn handle_start(&mut self, ctx: CommandCtx) -> LifecycleDecision {
        if self.in_flight.is_some() {
            return LifecycleDecision::rejected(self.phase, ErrorKind::WrongState);
        }
        match self.phase {
            LifecyclePhase::Starting | LifecyclePhase::Running => {
                return LifecycleDecision::replayed(self.pid(), self.phase);
            }
            LifecyclePhase::Stopping => {
                return LifecycleDecision::rejected(self.phase, ErrorKind::WrongState);
            }
            LifecyclePhase::Stopped | LifecyclePhase::Failed => {}
        }
        self.start_child(&ctx).await
    }

    async fn start_child(&mut self, ctx: &CommandCtx) -> LifecycleDecision {
        self.run_id = RunId::new();
        self.set_phase(LifecyclePhase::Starting, WorkerStatus::Starting, &ctx.reason);
        let spec = self.deps.spec.clone();
        match self
            .deps
            .supervisor
            .start(&spec.command, &spec.args, &spec.working_dir)
            .await
        {
            Ok(pid) => {
                if !self.audit(ctx, AuditAction::Start, None) {
                    let _ = self.deps.supervisor.stop(self.deps.stop_timeout).await;
                    self.set_phase(LifecyclePhase::Failed, WorkerStatus::Failed, "audit append failed");
                    return LifecycleDecision::rejected(self.phase, ErrorKind::Internal);
                }
                self.watch_child_exit();
                self.set_phase(LifecyclePhase::Running, WorkerStatus::Running, &ctx.reason);
                LifecycleDecision::accepted(Some(pid), self.phase)
            }
            Err(e) => {
                tracing::error!(error = %e, "spawn failed");
                self.set_phase(LifecyclePhase::Failed, WorkerStatus::CommandFailure, &e.to_string());
                LifecycleDecision::rejected(self.phase, ErrorKind::Validation)
            }
        }
    }

    fn watch_child_exit(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let Some(mut rx) = self.deps.supervisor.exit_receiver() else {
            return;
        };
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if rx.wait_for(|e| e.is_some()).await.is_ok() {
                let exit = *rx.borrow();
                if let Some(exit) = exit {
                    let _ = tx.send(Msg::ChildExited { generation, exit }).await;
                }
            }
        });
    }

    fn handle_stop(
        &mut self,
        ctx: CommandCtx,
        final_status: WorkerStatus,
        incident_id: Option<String>,
    ) -> LifecycleDecision {
        match self.in_flight {
            Some(OpKind::Stop) => {
                return LifecycleDecision::in_progress(self.pid(), self.phase)
            }
            Some(_) => return LifecycleDecision::rejected(self.phase, ErrorKind::WrongState),
            None => {}
        }
        if self.phase.is_terminal() {
            return LifecycleDecision::replayed(None, self.phase);
        }

        // Automatic kills (policy or safety ceiling) come from the monitor.
        let action = if ctx.source == "monitor" { AuditAction::AutoKill } else { AuditAction::Kill };
        if !self.audit(&ctx, action, incident_id) {
            return LifecycleDecision::rejected(self.phase, ErrorKind::Internal);
        }

        let pid = self.pid();
        self.in_flight = Some(OpKind::Stop);
        self.set_phase(LifecyclePhase::Stopping, WorkerStatus::Stopping, &ctx.reason);
        self.spawn_teardown(OpKind::Stop, ctx, final_status, None, Duration::ZERO);
        LifecycleDecision::accepted(pid, self.phase)
    }

    fn handle_restart(&mut self, ctx: CommandCtx, class: RestartClass) -> LifecycleDecision {
        match self.in_flight {
            Some(OpKind::Restart) => {
                return LifecycleDecision::in_progress(self.pid(), self.phase)
            }
            Some(_) => return LifecycleDecision::rejected(self.phase, ErrorKind::WrongState),
            None => {}
        }

        let now_ms = self.deps.clock.epoch_ms();
        match self.budget.evaluate(now_ms) {
            BudgetCheck::Denied { retry_after_seconds } => {
                self.audit(&ctx, AuditAction::RestartBlocked, None);
                self.deps.metrics.restart_blocked();
                return LifecycleDecision::rejected(self.phase, ErrorKind::BudgetExceeded)
                    .with_retry_after(retry_after_seconds);
            }
            BudgetCheck::Accepted => {}
        }

        // The slot is committed only once the accepting audit is durable;
        // a ledger failure here must not burn a limited restart attempt.
        if !self.audit(&ctx, AuditAction::Restart, None) {
            return LifecycleDecision::rejected(self.phase, ErrorKind::Internal);
        }
        self.budget.commit(now_ms);

        // Successive failure classes back off exponentially; operators on a
        // shared host get jitter so simultaneous restarts spread out.
        let delay = match class {
            RestartClass::UserInitiated => Duration::ZERO,
            class => {
                let base = self.backoff.next_delay(class);
                let unit = rand::thread_rng().gen_range(-1.0..1.0);
                self.backoff.with_jitter(base, unit)
            }
        };

        let pid = self.pid();
        self.in_flight = Some(OpKind::Restart);
        self.set_phase(LifecyclePhase::Stopping, WorkerStatus::Stopping, &ctx.reason);
        self.spawn_teardown(OpKind::Restart, ctx, WorkerStatus::Stopped, Some(class), delay);
        LifecycleDecision::accepted(pid, self.phase)
    }

    fn spawn_teardown(
        &self,
        op: OpKind,
        ctx: CommandCtx,
        final_status: WorkerStatus,
        restart_class: Option<RestartClass>,
        delay: Duration,
    ) {
        let supervisor = self.deps.supervisor.clone();
        let timeout = self.deps.stop_timeout;
        let tx = self.tx.clone();
        let started = std::time::Instant::now();
        tokio::spawn(async move {
            let clean = match supervisor.stop(timeout).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::error!(error = %e, "teardown left survivors");
                    false
                }
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = tx
                .send(Msg::StopFinished {
                    op,
                    ctx,
                    clean,
                    final_status,
                    restart_class,
                    started,
                })
                .await;
        });
    }

    async fn handle_stop_finished(
        &mut self,
        op: OpKind,
        ctx: CommandCtx,
        clean: bool,
        final_status: WorkerStatus,
        restart_class: Option<RestartClass>,
        started: std::time::Instant,
    ) {
        self.in_flight = None;
        if !clean {
            // Mixed teardown result: group signal delivered but the tree
            // could not be confirmed gone. Classified FAILED, not STOPPED.
            self.audit(
                &CommandCtx { reason: "orphan suspected after teardown".into(), ..ctx.clone() },
                AuditAction::OrphanSuspected,
                None,
            );
            self.set_phase(LifecyclePhase::Failed, WorkerStatus::Failed, "teardown incomplete");
            return;
        }

        match op {
            OpKind::Stop => {
                let elapsed = started.elapsed();
                self.deps.metrics.observe_stop(elapsed);
                self.set_phase(LifecyclePhase::Stopped, final_status, &ctx.reason);
            }
            OpKind::Restart => {
                let decision = self.start_child(&ctx).await;
                let elapsed = started.elapsed();
                self.deps.metrics.observe_restart(elapsed);
                if decision.is_rejected() {
                    tracing::error!("respawn after restart failed");
                } else if let Some(class) = restart_class {
                    if class == RestartClass::Crash {
                        // leave the crash streak; it resets on healthy exit
                    } else {
                        self.backoff.reset(class);
                    }
                }
            }
            OpKind::Start => {}
        }
    }

    fn handle_child_exit(&mut self, generation: u64, exit: ChildExit) {
        // Stale watcher from a previous run, or a teardown we initiated.
        if generation != self.generation || self.in_flight.is_some() {
            return;
        }
        if self.phase != LifecyclePhase::Running {
            return;
        }
        if exit.success() {
            self.backoff.reset(RestartClass::Crash);
            self.set_phase(LifecyclePhase::Stopped, WorkerStatus::Stopped, "command completed");
        } else {
            let reason = match exit.code {
                Some(code) => format!("command exited with code {code}"),
                None => "command terminated by signal".to_string(),
            };
            self.set_phase(LifecyclePhase::Failed, WorkerStatus::CommandFailure, &reason);
            self.audit(
                &CommandCtx {
                    actor: "supervisor".into(),
                    reason,
                    source: "supervisor".into(),
                    request_id: None,
                },
                AuditAction::Stop,
                None,
            );
        }
    }

    /// Hard resource ceiling breached (fd/socket counts). Unlike policy
    /// kills this bypasses the decider entirely: the incident records
    /// `SAFETY_LIMIT_EXCEEDED` and the tree comes down.
    fn handle_safety_limit(&mut self, reason: String, fd_count: usize, socket_count: usize) {
        if self.phase != LifecyclePhase::Running || self.in_flight.is_some() {
            return;
        }

        let uuid = uuid::Uuid::new_v4().to_string();
        let snapshot = self.deps.state.lock().snapshot();
        let incident = NewIncident {
            run_id: self.run_id.to_string(),
            command: self.command_line(),
            exit_reason: WorkerStatus::SafetyLimitExceeded.to_string(),
            max_cpu: snapshot.cpu_percent,
            pattern: self.deps.supervisor.output().last_line().unwrap_or_default(),
            reason: reason.clone(),
            cpu_score: snapshot.cpu_score,
            entropy_score: snapshot.entropy_score,
            confidence_score: snapshot.confidence_score,
            recovery_status: "killed".into(),
            restart_count: self.budget.in_window(self.deps.clock.epoch_ms()) as i64,
            incident_id: uuid.clone(),
            pid: self.pid(),
            ..Default::default()
        };
        if let Err(e) = self.deps.ledger.append_incident(&incident, &self.now()) {
            tracing::error!(error = %e, "safety incident append failed");
        }
        self.deps.metrics.incident_recorded();
        tracing::warn!(fd_count, socket_count, %reason, "safety limit exceeded, stopping child");

        let ctx = CommandCtx {
            actor: "safety-monitor".into(),
            reason,
            source: "monitor".into(),
            request_id: None,
        };
        let result = self.handle_stop(ctx, WorkerStatus::SafetyLimitExceeded, Some(uuid));
        if result.status == CommandStatus::Rejected {
            tracing::warn!(?result, "safety stop not enacted");
        }
    }

    async fn handle_policy(&mut self, decision: PolicyDecision, telemetry: Telemetry) {
        let incident_uuid = match decision.action {
            DecisionAction::Kill => Some(uuid::Uuid::new_v4().to_string()),
            _ => None,
        };

        // Ordering guarantee: the decision trace lands in the ledger before
        // the audit describing the action taken from it.
        let ctx = TraceContext::with_rollout(&self.deps.rollout_mode);
        let trace = NewDecisionTrace {
            run_id: self.run_id.to_string(),
            command: self.command_line(),
            pid: self.pid(),
            cpu_score: decision.cpu_score,
            entropy_score: decision.entropy_score,
            confidence_score: decision.confidence_score,
            decision: decision.action.to_string(),
            reason: decision.reason.clone(),
            decision_engine: ctx.decision_engine,
            engine_version: ctx.engine_version,
            decision_contract_version: ctx.decision_contract_version,
            rollout_mode: ctx.rollout_mode,
            replay_contract_version: ctx.replay_contract_version,
            incident_id: incident_uuid.clone(),
            request_id: None,
        };
        let stored = match self.deps.ledger.append_decision_trace(&trace, &self.now()) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(error = %e, "decision trace append failed");
                return;
            }
        };
        self.deps.metrics.decision_recorded(&decision.action.to_string());

        // Drift bookkeeping happens on every recorded trace.
        if let Err(e) = baseline::evaluate_and_record(
            &self.deps.ledger,
            &self.deps.baseline,
            &stored,
            None,
            &self.now(),
        ) {
            tracing::warn!(error = %e, "baseline evaluation failed");
        }

        match decision.action {
            DecisionAction::Continue => {}
            DecisionAction::Alert => {
                self.set_phase(self.phase, WorkerStatus::WatchdogAlert, &decision.reason);
                self.audit(
                    &CommandCtx {
                        actor: "policy".into(),
                        reason: decision.reason.clone(),
                        source: "monitor".into(),
                        request_id: None,
                    },
                    AuditAction::Alert,
                    None,
                );
            }
            DecisionAction::Kill => {
                let uuid = incident_uuid.unwrap_or_default();
                let incident = NewIncident {
                    run_id: self.run_id.to_string(),
                    command: self.command_line(),
                    model_name: String::new(),
                    exit_reason: WorkerStatus::LoopDetected.to_string(),
                    max_cpu: telemetry.cpu_percent,
                    pattern: self
                        .deps
                        .supervisor
                        .output()
                        .last_line()
                        .unwrap_or_default(),
                    token_savings_estimate: estimate_token_savings(&telemetry),
                    reason: decision.reason.clone(),
                    cpu_score: decision.cpu_score,
                    entropy_score: decision.entropy_score,
                    confidence_score: decision.confidence_score,
                    recovery_status: "killed".into(),
                    restart_count: self.budget.in_window(self.deps.clock.epoch_ms()) as i64,
                    incident_id: uuid.clone(),
                    pid: self.pid(),
                    request_id: None,
                };
                if let Err(e) = self.deps.ledger.append_incident(&incident, &self.now()) {
                    tracing::error!(error = %e, "incident append failed");
                }
                self.deps.metrics.incident_recorded();
                let ctx = CommandCtx {
                    actor: "policy".into(),
                    reason: decision.reason.clone(),
                    source: "monitor".into(),
                    request_id: None,
                };
                let result = self.handle_stop(ctx, WorkerStatus::LoopDetected, Some(uuid));
                if result.status == CommandStatus::Rejected {
                    tracing::warn!(?result, "policy kill not enacted");
                }
            }
            DecisionAction::Restart => {
                let ctx = CommandCtx {
                    actor: "policy".into(),
                    reason: decision.reason.clone(),
                    source: "monitor".into(),
                    request_id: None,
                };
                self.handle_restart(ctx, RestartClass::PolicyInitiated);
            }
        }
    }
}

/// Rough tokens-not-wasted estimate used in incident rows: scale of how long
/// the loop would have kept burning the window.
fn estimate_token_savings(telemetry: &Telemetry) -> f64 {
    (telemetry.cpu_over_for.as_secs_f64() * telemetry.log_repetition * 100.0).round()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
