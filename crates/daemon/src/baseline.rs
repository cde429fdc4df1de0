//! Glue between the pure drift analyzer and the ledger: load the bucket's
//! recent traces and previous state, evaluate, persist, and audit
//! transitions into and out of `at_risk`.

use flowforge_core::{AuditAction, DecisionTrace};
use flowforge_ledger::{Ledger, LedgerError, NewAudit, TraceFilter};
use flowforge_policy::{
    apply_baseline, bucket_key, evaluate_baseline, BaselineConfig, BaselineEvaluation,
    BaselineTransition,
};
use std::collections::BTreeMap;

/// Evaluate the bucket that `latest` belongs to, persist the resulting state
/// and emit transition audits annotated with `request_id` when present.
pub fn evaluate_and_record(
    ledger: &Ledger,
    config: &BaselineConfig,
    latest: &DecisionTrace,
    request_id: Option<&str>,
    now: &str,
) -> Result<Option<BaselineEvaluation>, LedgerError> {
    let filter = TraceFilter {
        engine: Some(latest.decision_engine.clone()),
        engine_version: Some(latest.engine_version.clone()),
        rollout_mode: Some(latest.rollout_mode.clone()),
    };
    let traces = ledger.recent_decision_traces(config.trace_limit, &filter)?;
    evaluate_bucket_traces(ledger, config, &traces, request_id, now)
}

/// Evaluate every bucket found in the recent trace window (operator-triggered
/// path). Returns evaluations keyed by bucket.
pub fn evaluate_all(
    ledger: &Ledger,
    config: &BaselineConfig,
    filter: &TraceFilter,
    request_id: Option<&str>,
    now: &str,
) -> Result<Vec<BaselineEvaluation>, LedgerError> {
    let traces = ledger.recent_decision_traces(config.trace_limit, filter)?;
    let mut buckets: BTreeMap<String, Vec<DecisionTrace>> = BTreeMap::new();
    for trace in traces {
        buckets.entry(bucket_key(&trace)).or_default().push(trace);
    }
    let mut evaluations = Vec::new();
    for traces in buckets.values() {
        if let Some(eval) =
            evaluate_bucket_traces(ledger, config, traces, request_id, now)?
        {
            evaluations.push(eval);
        }
    }
    Ok(evaluations)
}

fn evaluate_bucket_traces(
    ledger: &Ledger,
    config: &BaselineConfig,
    traces: &[DecisionTrace],
    request_id: Option<&str>,
    now: &str,
) -> Result<Option<BaselineEvaluation>, LedgerError> {
    let Some(latest) = traces.first() else {
        return Ok(None);
    };
    let key = bucket_key(latest);
    let previous = ledger.get_baseline_state(&key)?;
    let Some((evaluation, transition)) = evaluate_baseline(traces, previous.as_ref(), config)
    else {
        return Ok(None);
    };

    let state = apply_baseline(&evaluation, previous.as_ref(), now);
    ledger.upsert_baseline_state(&state)?;

    if let Some(transition) = transition {
        let action = match transition {
            BaselineTransition::AtRisk => AuditAction::SignalBaselineAtRisk,
            BaselineTransition::Recovered => AuditAction::SignalBaselineRecovered,
        };
        let mut payload = BTreeMap::new();
        payload.insert(
            "bucket_key".to_string(),
            serde_json::Value::String(evaluation.bucket_key.clone()),
        );
        payload.insert(
            "deltas".to_string(),
            serde_json::to_value(&evaluation.deltas).unwrap_or_default(),
        );
        payload.insert(
            "consecutive_breach_count".to_string(),
            serde_json::Value::from(evaluation.consecutive_breach_count),
        );
        ledger.append_audit(
            &NewAudit {
                run_id: latest.id.to_string(),
                actor: "baseline-monitor".into(),
                action: action.to_string(),
                details: format!(
                    "bucket {} moved to {} ({} breached signal(s))",
                    evaluation.bucket_key, evaluation.status, evaluation.breach_signal_count
                ),
                source: "policy".into(),
                pid: latest.pid,
                command: String::new(),
                incident_id: None,
                request_id: request_id.map(|s| s.to_string()),
                payload,
            },
            now,
        )?;
    }

    Ok(Some(evaluation))
}

#[cfg(test)]
#[path = "baseline_tests.rs"]
mod tests;
