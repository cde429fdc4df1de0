//! Persisted record types: incidents, decision traces, audits, the unified
//! timeline projection, idempotency records and signal-baseline state.

use crate::id::EventId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind discriminator for rows in the unified events table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Incident,
    Audit,
    Decision,
    PolicyDryRun,
}

crate::wire_enum! {
    EventKind {
        Incident => "incident",
        Audit => "audit",
        Decision => "decision",
        PolicyDryRun => "policy_dry_run",
    }
}

/// Rollout stage of the decision engine that produced a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutMode {
    Shadow,
    Canary,
    Enforce,
}

crate::wire_enum! {
    RolloutMode {
        Shadow => "shadow",
        Canary => "canary",
        Enforce => "enforce",
    }
}

impl RolloutMode {
    /// Parse a rollout value, tolerating whitespace and case.
    pub fn parse(s: &str) -> Option<Self> {
        Self::from_wire(s.trim().to_lowercase().as_str())
    }
}

/// Auditable control-plane action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    AutoKill,
    Kill,
    Restart,
    RestartBlocked,
    Alert,
    Start,
    Stop,
    OrphanSuspected,
    SignalBaselineAtRisk,
    SignalBaselineRecovered,
    IdempotencyConflict,
}

crate::wire_enum! {
    AuditAction {
        AutoKill => "AUTO_KILL",
        Kill => "KILL",
        Restart => "RESTART",
        RestartBlocked => "RESTART_BLOCKED",
        Alert => "ALERT",
        Start => "START",
        Stop => "STOP",
        OrphanSuspected => "ORPHAN_SUSPECTED",
        SignalBaselineAtRisk => "SIGNAL_BASELINE_AT_RISK",
        SignalBaselineRecovered => "SIGNAL_BASELINE_RECOVERED",
        IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
    }
}

/// A recorded intervention. The command and pattern columns are encrypted at
/// rest when a master key is configured; both are sanitized before encryption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: i64,
    pub timestamp: String,
    pub command: String,
    pub model_name: String,
    pub exit_reason: String,
    pub max_cpu: f64,
    pub pattern: String,
    pub token_savings_estimate: f64,
    pub reason: String,
    pub cpu_score: f64,
    pub entropy_score: f64,
    pub confidence_score: f64,
    pub recovery_status: String,
    pub restart_count: i64,
    /// External UUID used to correlate events across tables.
    pub incident_id: String,
}

/// One recorded policy decision, replayable via its digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTrace {
    pub id: i64,
    pub timestamp: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub cpu_score: f64,
    pub entropy_score: f64,
    pub confidence_score: f64,
    pub decision: String,
    pub reason: String,
    pub decision_engine: String,
    pub engine_version: String,
    pub decision_contract_version: String,
    pub rollout_mode: String,
    pub replay_contract_version: String,
    pub replay_digest: String,
}

/// A control-plane audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: i64,
    pub timestamp: String,
    pub actor: String,
    pub action: String,
    pub details: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Normalized projection over incidents, audits and decisions, used by the
/// timeline endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedEvent {
    pub event_id: EventId,
    pub created_at: String,
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub event_type: EventKind,
    pub title: String,
    pub actor: String,
    pub reason_text: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub cpu_score: f64,
    pub entropy_score: f64,
    pub confidence_score: f64,
    pub decision_engine: String,
    pub engine_version: String,
    pub decision_contract_version: String,
    pub rollout_mode: String,
    pub replay_contract_version: String,
    pub replay_digest: String,
    /// Opaque extra payload carried by the row.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub payload: BTreeMap<String, serde_json::Value>,
}

/// Replay-cache row for an idempotent mutation. The raw key is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key_hash: String,
    pub scope: String,
    pub request_fingerprint: String,
    pub status_code: u16,
    pub response_body: String,
    pub created_at: String,
}

/// Drift status of an `engine@version|rollout` bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalBaselineStatus {
    Healthy,
    Pending,
    AtRisk,
    InsufficientHistory,
}

crate::wire_enum! {
    SignalBaselineStatus {
        Healthy => "healthy",
        Pending => "pending",
        AtRisk => "at_risk",
        InsufficientHistory => "insufficient_history",
    }
}

/// Persisted escalation state for one signal-baseline bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalBaselineState {
    /// `engine@version|rollout`
    pub bucket_key: String,
    pub latest_trace_id: i64,
    pub consecutive_breach_count: u32,
    pub status: SignalBaselineStatus,
    pub last_transition_at: String,
    pub last_checked_at: String,
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;
