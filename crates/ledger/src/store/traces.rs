//! Decision trace persistence. Traces live in the `events` table with
//! `event_type = 'decision'`; the replay digest is computed over the
//! canonical input at insert time.

use super::{Ledger, NewDecisionTrace};
use crate::error::LedgerError;
use flowforge_core::{DecisionTrace, EventId};
use rusqlite::{params, Row};

/// Optional filters for trace queries.
#[derive(Debug, Clone, Default)]
pub struct TraceFilter {
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    pub rollout_mode: Option<String>,
}

impl Ledger {
    /// Append a decision trace. The digest is computed here so every
    /// persisted non-legacy trace carries one (and re-verification matches
    /// byte-for-byte).
    pub fn append_decision_trace(
        &self,
        new: &NewDecisionTrace,
        now: &str,
    ) -> Result<DecisionTrace, LedgerError> {
        let command = self.sanitize(&new.command);
        let reason = self.sanitize(&new.reason);

        let mut trace = DecisionTrace {
            id: 0,
            timestamp: now.to_string(),
            command,
            pid: new.pid,
            cpu_score: new.cpu_score,
            entropy_score: new.entropy_score,
            confidence_score: new.confidence_score,
            decision: new.decision.clone(),
            reason,
            decision_engine: new.decision_engine.clone(),
            engine_version: new.engine_version.clone(),
            decision_contract_version: new.decision_contract_version.clone(),
            rollout_mode: new.rollout_mode.clone(),
            replay_contract_version: new.replay_contract_version.clone(),
            replay_digest: String::new(),
        };
        trace.replay_digest = flowforge_policy::compute_digest(&trace);

        let event_id = EventId::new();
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events (
                     event_id, created_at, run_id, incident_id, request_id, event_type,
                     title, actor, decision, reason_text, summary, command, pid,
                     cpu_score, entropy_score, confidence_score,
                     decision_engine, engine_version, decision_contract_version,
                     rollout_mode, replay_contract_version, replay_digest
                 ) VALUES (?1, ?2, ?3, ?4, ?5, 'decision', ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                           ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
                params![
                    event_id.as_str(),
                    now,
                    new.run_id,
                    new.incident_id,
                    new.request_id,
                    trace.decision,
                    trace.decision_engine,
                    trace.decision,
                    trace.reason,
                    format!("decision {} by {}", trace.decision, trace.decision_engine),
                    trace.command,
                    trace.pid.map(|p| p as i64),
                    trace.cpu_score,
                    trace.entropy_score,
                    trace.confidence_score,
                    trace.decision_engine,
                    trace.engine_version,
                    trace.decision_contract_version,
                    trace.rollout_mode,
                    trace.replay_contract_version,
                    trace.replay_digest,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        trace.id = id;
        Ok(trace)
    }

    /// Fetch one trace by its row id.
    pub fn get_decision_trace(&self, id: i64) -> Result<Option<DecisionTrace>, LedgerError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM events WHERE id = ?1 AND event_type = 'decision'",
            )?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_trace(row)?)),
                None => Ok(None),
            }
        })
    }

    /// Newest-first recent traces, optionally filtered by engine identity.
    pub fn recent_decision_traces(
        &self,
        limit: usize,
        filter: &TraceFilter,
    ) -> Result<Vec<DecisionTrace>, LedgerError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM events
                 WHERE event_type = 'decision'
                   AND (?1 IS NULL OR decision_engine = ?1)
                   AND (?2 IS NULL OR engine_version = ?2)
                   AND (?3 IS NULL OR rollout_mode = ?3)
                 ORDER BY id DESC LIMIT ?4",
            )?;
            let mut rows = stmt.query(params![
                filter.engine,
                filter.engine_version,
                filter.rollout_mode,
                limit as i64,
            ])?;
            let mut traces = Vec::new();
            while let Some(row) = rows.next()? {
                traces.push(row_to_trace(row)?);
            }
            Ok(traces)
        })
    }
}

fn row_to_trace(row: &Row<'_>) -> rusqlite::Result<DecisionTrace> {
    Ok(DecisionTrace {
        id: row.get("id")?,
        timestamp: row.get("created_at")?,
        command: row.get("command")?,
        pid: row.get::<_, Option<i64>>("pid")?.map(|p| p as u32),
        cpu_score: row.get("cpu_score")?,
        entropy_score: row.get("entropy_score")?,
        confidence_score: row.get("confidence_score")?,
        decision: row.get("decision")?,
        reason: row.get("reason_text")?,
        decision_engine: row.get("decision_engine")?,
        engine_version: row.get("engine_version")?,
        decision_contract_version: row.get("decision_contract_version")?,
        rollout_mode: row.get("rollout_mode")?,
        replay_contract_version: row.get("replay_contract_version")?,
        replay_digest: row.get("replay_digest")?,
    })
}

#[cfg(test)]
#[path = "traces_tests.rs"]
mod tests;
