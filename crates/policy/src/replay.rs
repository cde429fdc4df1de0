//! Deterministic replay digest over canonicalized decision inputs.
//!
//! Canonicalization: trim strings, uppercase `decision`, lowercase
//! `rollout_mode`, round scores to 6 decimal places (half-to-even, `-0 → 0`).
//! Empty identity fields on legacy rows are backfilled with fixed sentinels
//! and the row is tagged `legacy_fallback`.

use flowforge_core::{DecisionAction, DecisionTrace};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sentinel backfills for legacy rows, in field order.
pub const LEGACY_ENGINE: &str = "legacy-decider";
pub const LEGACY_ENGINE_VERSION: &str = "legacy-unknown";
pub const LEGACY_CONTRACT: &str = "legacy-decision-trace";
pub const LEGACY_ROLLOUT: &str = "legacy";

/// Outcome of verifying a stored trace against its recomputed digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "verdict")]
pub enum ReplayVerdict {
    Match,
    Mismatch { expected: String, actual: String },
    MissingDigest,
    LegacyFallback,
    NotReplayable,
}

impl ReplayVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Match => "MATCH",
            Self::Mismatch { .. } => "MISMATCH",
            Self::MissingDigest => "MISSING_DIGEST",
            Self::LegacyFallback => "LEGACY_FALLBACK",
            Self::NotReplayable => "NOT_REPLAYABLE",
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Canonicalized digest input.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalDecision {
    pub decision_engine: String,
    pub engine_version: String,
    pub decision_contract_version: String,
    pub rollout_mode: String,
    pub decision: String,
    pub reason: String,
    pub cpu_score: f64,
    pub entropy_score: f64,
    pub confidence_score: f64,
    pub legacy_fallback: bool,
}

/// Round to six decimal places, ties to even, normalizing `-0` to `0`.
pub fn round6(value: f64) -> f64 {
    let scaled = (value * 1e6).round_ties_even() / 1e6;
    if scaled == 0.0 {
        0.0
    } else {
        scaled
    }
}

fn backfill<'a>(value: &'a str, sentinel: &'a str) -> (&'a str, bool) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        (sentinel, true)
    } else {
        (trimmed, false)
    }
}

/// Canonicalize a trace row for digesting.
pub fn canonicalize(trace: &DecisionTrace) -> CanonicalDecision {
    let (engine, f1) = backfill(&trace.decision_engine, LEGACY_ENGINE);
    let (version, f2) = backfill(&trace.engine_version, LEGACY_ENGINE_VERSION);
    let (contract, f3) = backfill(&trace.decision_contract_version, LEGACY_CONTRACT);
    let (rollout, f4) = backfill(&trace.rollout_mode, LEGACY_ROLLOUT);

    CanonicalDecision {
        decision_engine: engine.to_string(),
        engine_version: version.to_string(),
        decision_contract_version: contract.to_string(),
        rollout_mode: rollout.to_lowercase(),
        decision: trace.decision.trim().to_uppercase(),
        reason: trace.reason.trim().to_string(),
        cpu_score: round6(trace.cpu_score),
        entropy_score: round6(trace.entropy_score),
        confidence_score: round6(trace.confidence_score),
        legacy_fallback: f1 || f2 || f3 || f4,
    }
}

/// Newline-joined `key=value` digest input in the fixed key order.
pub fn canonical_input(trace: &DecisionTrace) -> String {
    let canonical = canonicalize(trace);
    format!(
        "decision_engine={}\nengine_version={}\ndecision_contract_version={}\n\
         rollout_mode={}\ndecision={}\nreason={}\n\
         cpu_score={:.6}\nentropy_score={:.6}\nconfidence_score={:.6}",
        canonical.decision_engine,
        canonical.engine_version,
        canonical.decision_contract_version,
        canonical.rollout_mode,
        canonical.decision,
        canonical.reason,
        canonical.cpu_score,
        canonical.entropy_score,
        canonical.confidence_score,
    )
}

/// Hex SHA-256 digest over the canonical input.
pub fn compute_digest(trace: &DecisionTrace) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_input(trace).as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify a stored trace: recompute the digest over the canonical input and
/// compare byte-for-byte with the persisted value.
pub fn verify(trace: &DecisionTrace) -> ReplayVerdict {
    let decision = trace.decision.trim();
    if decision.is_empty() || DecisionAction::parse(decision).is_none() {
        return ReplayVerdict::NotReplayable;
    }
    if canonicalize(trace).legacy_fallback {
        return ReplayVerdict::LegacyFallback;
    }
    let stored = trace.replay_digest.trim();
    if stored.is_empty() {
        return ReplayVerdict::MissingDigest;
    }
    let actual = compute_digest(trace);
    if actual == stored {
        ReplayVerdict::Match
    } else {
        ReplayVerdict::Mismatch { expected: stored.to_string(), actual }
    }
}

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;
