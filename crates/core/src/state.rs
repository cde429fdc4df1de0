//! Process and run state shared between the supervisor, monitor, lifecycle
//! manager and the HTTP control plane.

use crate::id::RunId;
use serde::{Deserialize, Serialize};

/// Operational status of the supervised worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Starting,
    Running,
    Stopping,
    Stopped,
    LoopDetected,
    WatchdogAlert,
    SafetyLimitExceeded,
    CommandFailure,
    UserTerminated,
    Failed,
}

crate::wire_enum! {
    WorkerStatus {
        Starting => "STARTING",
        Running => "RUNNING",
        Stopping => "STOPPING",
        Stopped => "STOPPED",
        LoopDetected => "LOOP_DETECTED",
        WatchdogAlert => "WATCHDOG_ALERT",
        SafetyLimitExceeded => "SAFETY_LIMIT_EXCEEDED",
        CommandFailure => "COMMAND_FAILURE",
        UserTerminated => "USER_TERMINATED",
        Failed => "FAILED",
    }
}

/// Coarse lifecycle phase driven by the lifecycle manager state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecyclePhase {
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

crate::wire_enum! {
    LifecyclePhase {
        Starting => "STARTING",
        Running => "RUNNING",
        Stopping => "STOPPING",
        Stopped => "STOPPED",
        Failed => "FAILED",
    }
}

impl LifecyclePhase {
    /// Whether the phase allows accepting a new start.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    Completed,
    LoopDetected,
    SafetyLimitExceeded,
    CommandFailure,
    UserTerminated,
    WatchdogAlert,
}

crate::wire_enum! {
    ExitReason {
        Completed => "COMPLETED",
        LoopDetected => "LOOP_DETECTED",
        SafetyLimitExceeded => "SAFETY_LIMIT_EXCEEDED",
        CommandFailure => "COMMAND_FAILURE",
        UserTerminated => "USER_TERMINATED",
        WatchdogAlert => "WATCHDOG_ALERT",
    }
}

/// A supervised run of a child command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: RunId,
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: String,
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_reason: Option<ExitReason>,
}

/// The single in-memory view of the supervised process.
///
/// Exactly one current value exists process-wide; all mutations go through
/// the lifecycle manager. Readers get a [`ProcessState::snapshot`], a deep
/// copy, so mutating the returned value never leaks back into shared state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessState {
    pub cpu_percent: f64,
    /// Last output line, already passed through the redactor.
    pub last_output_line: String,
    pub status: WorkerStatus,
    pub lifecycle: LifecyclePhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub reason: String,
    pub cpu_score: f64,
    pub entropy_score: f64,
    pub confidence_score: f64,
    pub timestamp_ms: u64,
}

impl Default for ProcessState {
    fn default() -> Self {
        Self {
            cpu_percent: 0.0,
            last_output_line: String::new(),
            status: WorkerStatus::Stopped,
            lifecycle: LifecyclePhase::Stopped,
            pid: None,
            reason: String::new(),
            cpu_score: 0.0,
            entropy_score: 0.0,
            confidence_score: 0.0,
            timestamp_ms: 0,
        }
    }
}

impl ProcessState {
    /// Deep-copy snapshot for readers.
    pub fn snapshot(&self) -> ProcessState {
        self.clone()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
