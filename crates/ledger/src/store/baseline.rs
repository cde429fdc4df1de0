//! Persisted signal-baseline bucket state. This table is mutable by design:
//! it is derived state, not part of the append-only event history.

use super::Ledger;
use crate::error::LedgerError;
use flowforge_core::{SignalBaselineState, SignalBaselineStatus};
use rusqlite::{params, OptionalExtension, Row};

impl Ledger {
    pub fn get_baseline_state(
        &self,
        bucket_key: &str,
    ) -> Result<Option<SignalBaselineState>, LedgerError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT * FROM decision_signal_baseline_state WHERE bucket_key = ?1",
                    params![bucket_key],
                    row_to_state,
                )
                .optional()?)
        })
    }

    pub fn upsert_baseline_state(
        &self,
        state: &SignalBaselineState,
    ) -> Result<(), LedgerError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO decision_signal_baseline_state
                     (bucket_key, latest_trace_id, consecutive_breach_count,
                      status, last_transition_at, last_checked_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (bucket_key) DO UPDATE SET
                     latest_trace_id = excluded.latest_trace_id,
                     consecutive_breach_count = excluded.consecutive_breach_count,
                     status = excluded.status,
                     last_transition_at = excluded.last_transition_at,
                     last_checked_at = excluded.last_checked_at",
                params![
                    state.bucket_key,
                    state.latest_trace_id,
                    state.consecutive_breach_count,
                    state.status.to_string(),
                    state.last_transition_at,
                    state.last_checked_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_baseline_states(&self) -> Result<Vec<SignalBaselineState>, LedgerError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM decision_signal_baseline_state ORDER BY bucket_key",
            )?;
            let mut rows = stmt.query([])?;
            let mut states = Vec::new();
            while let Some(row) = rows.next()? {
                states.push(row_to_state(row)?);
            }
            Ok(states)
        })
    }
}

fn row_to_state(row: &Row<'_>) -> rusqlite::Result<SignalBaselineState> {
    let status: String = row.get("status")?;
    Ok(SignalBaselineState {
        bucket_key: row.get("bucket_key")?,
        latest_trace_id: row.get("latest_trace_id")?,
        consecutive_breach_count: row.get::<_, i64>("consecutive_breach_count")? as u32,
        status: SignalBaselineStatus::from_wire(&status)
            .unwrap_or(SignalBaselineStatus::InsufficientHistory),
        last_transition_at: row.get("last_transition_at")?,
        last_checked_at: row.get("last_checked_at")?,
    })
}

#[cfg(test)]
#[path = "baseline_tests.rs"]
mod tests;
