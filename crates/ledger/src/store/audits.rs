//! Audit event persistence.

use super::{Ledger, NewAudit};
use crate::error::LedgerError;
use flowforge_core::{AuditEvent, EventId};
use rusqlite::params;

impl Ledger {
    /// Append a control-plane audit event.
    pub fn append_audit(&self, new: &NewAudit, now: &str) -> Result<AuditEvent, LedgerError> {
        let details = self.sanitize(&new.details);
        let command = self.sanitize(&new.command);
        let payload = serde_json::to_string(&new.payload).unwrap_or_else(|_| "{}".to_string());

        let event_id = EventId::new();
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events (
                     event_id, created_at, run_id, incident_id, request_id, event_type,
                     title, actor, action, details, source, command, pid,
                     reason_text, summary, payload
                 ) VALUES (?1, ?2, ?3, ?4, ?5, 'audit', ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                           ?13, ?14, ?15)",
                params![
                    event_id.as_str(),
                    now,
                    new.run_id,
                    new.incident_id,
                    new.request_id,
                    new.action,
                    new.actor,
                    new.action,
                    details,
                    new.source,
                    command,
                    new.pid.map(|p| p as i64),
                    details,
                    format!("{} by {}", new.action, new.actor),
                    payload,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        Ok(AuditEvent {
            id,
            timestamp: now.to_string(),
            actor: new.actor.clone(),
            action: new.action.clone(),
            details,
            source: new.source.clone(),
            pid: new.pid,
            command,
            incident_id: new.incident_id.clone(),
            request_id: new.request_id.clone(),
        })
    }

    /// Timestamps of accepted restarts since `since` (inclusive), oldest
    /// first. Used to reload the restart budget window on daemon start.
    pub fn restart_audit_times_since(&self, since: &str) -> Result<Vec<String>, LedgerError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT created_at FROM events
                 WHERE event_type = 'audit' AND action = 'RESTART' AND created_at >= ?1
                 ORDER BY id ASC",
            )?;
            let mut rows = stmt.query(params![since])?;
            let mut times = Vec::new();
            while let Some(row) = rows.next()? {
                times.push(row.get(0)?);
            }
            Ok(times)
        })
    }
}

#[cfg(test)]
#[path = "audits_tests.rs"]
mod tests;
