//! Policy decisions and lifecycle command outcomes.

use crate::state::LifecyclePhase;
use serde::{Deserialize, Serialize};

/// Action the policy engine asks the lifecycle manager to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionAction {
    Continue,
    Alert,
    Kill,
    Restart,
}

crate::wire_enum! {
    DecisionAction {
        Continue => "CONTINUE",
        Alert => "ALERT",
        Kill => "KILL",
        Restart => "RESTART",
    }
}

impl DecisionAction {
    /// Parse a decision value, tolerating whitespace and case.
    pub fn parse(s: &str) -> Option<Self> {
        Self::from_wire(s.trim().to_uppercase().as_str())
    }
}

/// Output of the threshold decider for one telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub action: DecisionAction,
    pub reason: String,
    pub cpu_score: f64,
    pub entropy_score: f64,
    pub confidence_score: f64,
}

/// Outcome class of a control-plane command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Accepted,
    InProgress,
    Replayed,
    Rejected,
}

crate::wire_enum! {
    CommandStatus {
        Accepted => "ACCEPTED",
        InProgress => "IN_PROGRESS",
        Replayed => "REPLAYED",
        Rejected => "REJECTED",
    }
}

/// Error classification surfaced to the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    Forbidden,
    Conflict,
    RateLimited,
    NotFound,
    BudgetExceeded,
    WrongState,
    Unavailable,
    Internal,
}

crate::wire_enum! {
    ErrorKind {
        Validation => "validation",
        Unauthorized => "unauthorized",
        Forbidden => "forbidden",
        Conflict => "conflict",
        RateLimited => "rate_limited",
        NotFound => "not_found",
        BudgetExceeded => "budget_exceeded",
        WrongState => "wrong_state",
        Unavailable => "unavailable",
        Internal => "internal",
    }
}

/// Reply from the lifecycle manager for START/STOP/RESTART commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleDecision {
    pub status: CommandStatus,
    pub accepted_new: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub lifecycle: LifecyclePhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl LifecycleDecision {
    pub fn accepted(pid: Option<u32>, lifecycle: LifecyclePhase) -> Self {
        Self {
            status: CommandStatus::Accepted,
            accepted_new: true,
            pid,
            lifecycle,
            retry_after_seconds: None,
            error_kind: None,
        }
    }

    pub fn in_progress(pid: Option<u32>, lifecycle: LifecyclePhase) -> Self {
        Self {
            status: CommandStatus::InProgress,
            accepted_new: false,
            pid,
            lifecycle,
            retry_after_seconds: None,
            error_kind: None,
        }
    }

    pub fn replayed(pid: Option<u32>, lifecycle: LifecyclePhase) -> Self {
        Self {
            status: CommandStatus::Replayed,
            accepted_new: false,
            pid,
            lifecycle,
            retry_after_seconds: None,
            error_kind: None,
        }
    }

    pub fn rejected(lifecycle: LifecyclePhase, kind: ErrorKind) -> Self {
        Self {
            status: CommandStatus::Rejected,
            accepted_new: false,
            pid: None,
            lifecycle,
            retry_after_seconds: None,
            error_kind: Some(kind),
        }
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_seconds = Some(seconds);
        self
    }

    pub fn is_rejected(&self) -> bool {
        self.status == CommandStatus::Rejected
    }
}

#[cfg(test)]
#[path = "decision_tests.rs"]
mod tests;
