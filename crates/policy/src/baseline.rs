//! Signal-baseline drift analysis over recent decision traces.
//!
//! Traces are grouped into buckets keyed by `engine@version|rollout`. The
//! most recent trace is compared against the mean of the remaining baseline;
//! a streak of consecutive breaches promotes the bucket from `pending` to
//! `at_risk`. Pure and clock-injected: callers pass timestamps in.

use flowforge_core::{DecisionTrace, SignalBaselineState, SignalBaselineStatus};
use serde::{Deserialize, Serialize};

/// Tuning for the drift analyzer. Values are clamped to their caps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    pub cpu_delta_threshold: f64,
    pub entropy_delta_threshold: f64,
    pub confidence_delta_threshold: f64,
    pub min_baseline_samples: usize,
    pub required_consecutive_breaches: u32,
    pub trace_limit: usize,
}

pub const MIN_SAMPLES_CAP: usize = 100;
pub const CONSECUTIVE_CAP: u32 = 10;
pub const TRACE_LIMIT_CAP: usize = 5_000;

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            cpu_delta_threshold: 25.0,
            entropy_delta_threshold: 20.0,
            confidence_delta_threshold: 20.0,
            min_baseline_samples: 3,
            required_consecutive_breaches: 2,
            trace_limit: 500,
        }
    }
}

impl BaselineConfig {
    /// Clamp tunables to their documented caps.
    pub fn clamped(mut self) -> Self {
        self.min_baseline_samples = self.min_baseline_samples.clamp(1, MIN_SAMPLES_CAP);
        self.required_consecutive_breaches =
            self.required_consecutive_breaches.clamp(1, CONSECUTIVE_CAP);
        self.trace_limit = self.trace_limit.clamp(1, TRACE_LIMIT_CAP);
        self
    }
}

/// Bucket key for a trace: `engine@version|rollout`.
pub fn bucket_key(trace: &DecisionTrace) -> String {
    format!(
        "{}@{}|{}",
        trace.decision_engine.trim(),
        trace.engine_version.trim(),
        trace.rollout_mode.trim().to_lowercase()
    )
}

/// Per-signal drift measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDelta {
    pub signal: String,
    pub baseline_mean: f64,
    pub latest: f64,
    pub delta: f64,
    pub threshold: f64,
    pub breached: bool,
}

/// One evaluation of a bucket against its baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineEvaluation {
    pub bucket_key: String,
    pub latest_trace_id: i64,
    pub baseline_count: usize,
    pub deltas: Vec<SignalDelta>,
    pub breach_signal_count: usize,
    pub status: SignalBaselineStatus,
    pub consecutive_breach_count: u32,
}

/// Status change worth an audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BaselineTransition {
    /// The bucket crossed into `at_risk`.
    AtRisk,
    /// The bucket left `at_risk` and is healthy again.
    Recovered,
}

fn delta(signal: &str, baseline: &[f64], latest: f64, threshold: f64) -> SignalDelta {
    let mean = if baseline.is_empty() {
        0.0
    } else {
        baseline.iter().sum::<f64>() / baseline.len() as f64
    };
    let delta = (latest - mean).abs();
    SignalDelta {
        signal: signal.to_string(),
        baseline_mean: mean,
        latest,
        delta,
        threshold,
        breached: delta >= threshold,
    }
}

/// Evaluate one bucket's traces (newest first) against the baseline, carrying
/// the previous persisted state to track streaks.
///
/// Returns `None` when the bucket has no traces. The streak only advances
/// when the latest trace id differs from the previously evaluated one;
/// re-evaluating the same latest is a no-op for the counter.
pub fn evaluate(
    traces: &[DecisionTrace],
    previous: Option<&SignalBaselineState>,
    config: &BaselineConfig,
) -> Option<(BaselineEvaluation, Option<BaselineTransition>)> {
    let latest = traces.first()?;
    let baseline: Vec<&DecisionTrace> = traces.iter().skip(1).collect();
    let key = bucket_key(latest);

    let deltas = vec![
        delta(
            "cpu_score",
            &baseline.iter().map(|t| t.cpu_score).collect::<Vec<_>>(),
            latest.cpu_score,
            config.cpu_delta_threshold,
        ),
        delta(
            "entropy_score",
            &baseline.iter().map(|t| t.entropy_score).collect::<Vec<_>>(),
            latest.entropy_score,
            config.entropy_delta_threshold,
        ),
        delta(
            "confidence_score",
            &baseline.iter().map(|t| t.confidence_score).collect::<Vec<_>>(),
            latest.confidence_score,
            config.confidence_delta_threshold,
        ),
    ];
    let breach_signal_count = deltas.iter().filter(|d| d.breached).count();

    let prev_status = previous.map(|p| p.status);
    let prev_streak = previous.map(|p| p.consecutive_breach_count).unwrap_or(0);
    let same_latest = previous.map(|p| p.latest_trace_id) == Some(latest.id);

    let (status, streak) = if baseline.len() < config.min_baseline_samples {
        (SignalBaselineStatus::InsufficientHistory, 0)
    } else if breach_signal_count == 0 {
        (SignalBaselineStatus::Healthy, 0)
    } else {
        let streak = if same_latest {
            prev_streak
        } else {
            prev_streak.saturating_add(1)
        };
        if streak >= config.required_consecutive_breaches {
            (SignalBaselineStatus::AtRisk, streak)
        } else {
            (SignalBaselineStatus::Pending, streak)
        }
    };

    let transition = match (prev_status, status) {
        (Some(SignalBaselineStatus::AtRisk), SignalBaselineStatus::AtRisk) => None,
        (_, SignalBaselineStatus::AtRisk) => Some(BaselineTransition::AtRisk),
        (Some(SignalBaselineStatus::AtRisk), _) => Some(BaselineTransition::Recovered),
        _ => None,
    };

    Some((
        BaselineEvaluation {
            bucket_key: key,
            latest_trace_id: latest.id,
            baseline_count: baseline.len(),
            deltas,
            breach_signal_count,
            status,
            consecutive_breach_count: streak,
        },
        transition,
    ))
}

/// Fold an evaluation into the persisted bucket state.
pub fn apply(
    evaluation: &BaselineEvaluation,
    previous: Option<&SignalBaselineState>,
    now_rfc3339: &str,
) -> SignalBaselineState {
    let transitioned = previous.map(|p| p.status) != Some(evaluation.status);
    SignalBaselineState {
        bucket_key: evaluation.bucket_key.clone(),
        latest_trace_id: evaluation.latest_trace_id,
        consecutive_breach_count: evaluation.consecutive_breach_count,
        status: evaluation.status,
        last_transition_at: if transitioned {
            now_rfc3339.to_string()
        } else {
            previous
                .map(|p| p.last_transition_at.clone())
                .unwrap_or_else(|| now_rfc3339.to_string())
        },
        last_checked_at: now_rfc3339.to_string(),
    }
}

#[cfg(test)]
#[path = "baseline_tests.rs"]
mod tests;
