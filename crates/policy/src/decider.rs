//! Ordered threshold rules turning one telemetry sample into a decision.

use flowforge_core::{DecisionAction, PolicyDecision, PolicyLimits, Telemetry};
use serde::{Deserialize, Serialize};

/// Name recorded in every decision trace produced by this decider.
pub const ENGINE_NAME: &str = "threshold-decider";
/// Engine version recorded in every decision trace.
pub const ENGINE_VERSION: &str = "1.1.0";
/// Contract version of the trace row layout.
pub const DECISION_CONTRACT_VERSION: &str = "decision-trace/1";
/// Contract version of the replay digest canonicalization.
pub const REPLAY_CONTRACT_VERSION: &str = "replay-digest/1";

/// Raw diversity at or above this ratio marks the output as healthy even
/// under a CPU spike.
const HEALTHY_DIVERSITY_FLOOR: f64 = 0.85;

/// Engine identity attached to traces at persistence time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub decision_engine: String,
    pub engine_version: String,
    pub decision_contract_version: String,
    pub rollout_mode: String,
    pub replay_contract_version: String,
}

impl Default for TraceContext {
    fn default() -> Self {
        Self {
            decision_engine: ENGINE_NAME.to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            decision_contract_version: DECISION_CONTRACT_VERSION.to_string(),
            rollout_mode: "enforce".to_string(),
            replay_contract_version: REPLAY_CONTRACT_VERSION.to_string(),
        }
    }
}

impl TraceContext {
    pub fn with_rollout(mode: &str) -> Self {
        Self { rollout_mode: mode.to_string(), ..Self::default() }
    }
}

/// Evaluate the threshold rules for one sample. Rules run in order; the first
/// match wins.
///
/// The healthy-spike guard caps severity at ALERT: progressing output (or raw
/// diversity at/above the floor) is never killed, no matter how hot the CPU
/// runs. Without a CPU breach the same signals mean normal forward progress
/// and the decider continues.
pub fn decide(telemetry: &Telemetry, limits: &PolicyLimits) -> PolicyDecision {
    let cpu_score = cpu_score(telemetry.cpu_percent, limits.max_cpu_percent);
    let entropy_score = entropy_score(telemetry.log_entropy);
    let confidence_score = confidence(cpu_score, entropy_score);

    let cpu_breach = telemetry.cpu_percent >= limits.max_cpu_percent
        && telemetry.cpu_over_for >= limits.cpu_window;
    let healthy_spike =
        telemetry.progress_like || telemetry.raw_diversity >= HEALTHY_DIVERSITY_FLOOR;
    let output_degraded = telemetry.log_repetition >= limits.max_log_repetition
        || telemetry.log_entropy <= limits.min_log_entropy;

    let (action, reason) = if cpu_breach && healthy_spike {
        (
            DecisionAction::Alert,
            format!(
                "progressing output pattern detected under cpu spike \
                 (cpu={:.1}% >= {:.1}% for {:.0}s, diversity={:.2})",
                telemetry.cpu_percent,
                limits.max_cpu_percent,
                telemetry.cpu_over_for.as_secs_f64(),
                telemetry.raw_diversity,
            ),
        )
    } else if cpu_breach && output_degraded {
        (
            DecisionAction::Kill,
            format!(
                "cpu={:.1}% >= {:.1}% for {:.0}s (window {:.0}s), \
                 repetition={:.2} (max {:.2}), entropy={:.2} (min {:.2})",
                telemetry.cpu_percent,
                limits.max_cpu_percent,
                telemetry.cpu_over_for.as_secs_f64(),
                limits.cpu_window.as_secs_f64(),
                telemetry.log_repetition,
                limits.max_log_repetition,
                telemetry.log_entropy,
                limits.min_log_entropy,
            ),
        )
    } else if cpu_breach {
        (
            DecisionAction::Alert,
            format!(
                "cpu={:.1}% >= {:.1}% for {:.0}s, output still varied",
                telemetry.cpu_percent,
                limits.max_cpu_percent,
                telemetry.cpu_over_for.as_secs_f64(),
            ),
        )
    } else {
        (DecisionAction::Continue, "within limits".to_string())
    };

    PolicyDecision { action, reason, cpu_score, entropy_score, confidence_score }
}

/// CPU score: 0..100, saturating at 100 when usage hits the ceiling.
fn cpu_score(cpu_percent: f64, max_cpu_percent: f64) -> f64 {
    if max_cpu_percent <= 0.0 {
        return 0.0;
    }
    (cpu_percent / max_cpu_percent * 100.0).clamp(0.0, 100.0)
}

/// Project Shannon byte entropy (0..8 bits) onto 0..100.
fn entropy_score(log_entropy: f64) -> f64 {
    (log_entropy / 8.0 * 100.0).clamp(0.0, 100.0)
}

fn confidence(cpu_score: f64, entropy_score: f64) -> f64 {
    0.65 * cpu_score + 0.35 * (100.0 - entropy_score)
}

#[cfg(test)]
#[path = "decider_tests.rs"]
mod tests;
