//! Incident persistence: sanitize, encrypt designated columns, and project a
//! unified `incident` event in the same transaction.

use super::{check_cursor, check_limit, Ledger, NewIncident, Page};
use crate::error::LedgerError;
use flowforge_core::{EventId, Incident};
use rusqlite::{params, Row};

impl Ledger {
    /// Append an incident and its timeline projection. Returns the stored row
    /// (with decrypted, sanitized columns).
    pub fn append_incident(
        &self,
        new: &NewIncident,
        now: &str,
    ) -> Result<Incident, LedgerError> {
        let command = self.sanitize(&new.command);
        let pattern = self.sanitize(&new.pattern);
        let reason = self.sanitize(&new.reason);
        let sealed_command = self.cipher().seal(&command)?;
        let sealed_pattern = self.cipher().seal(&pattern)?;

        let event_id = EventId::new();
        let id = self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO incidents (
                     timestamp, command, model_name, exit_reason, max_cpu, pattern,
                     token_savings_estimate, reason, cpu_score, entropy_score,
                     confidence_score, recovery_status, restart_count, incident_id
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    now,
                    sealed_command,
                    new.model_name,
                    new.exit_reason,
                    new.max_cpu,
                    sealed_pattern,
                    new.token_savings_estimate,
                    reason,
                    new.cpu_score,
                    new.entropy_score,
                    new.confidence_score,
                    new.recovery_status,
                    new.restart_count,
                    new.incident_id,
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO events (
                     event_id, created_at, run_id, incident_id, request_id, event_type,
                     title, actor, reason_text, summary, pid,
                     cpu_score, entropy_score, confidence_score
                 ) VALUES (?1, ?2, ?3, ?4, ?5, 'incident', ?6, 'policy', ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    event_id.as_str(),
                    now,
                    new.run_id,
                    new.incident_id,
                    new.request_id,
                    new.exit_reason,
                    reason,
                    format!("incident recorded: {}", new.exit_reason),
                    new.pid.map(|p| p as i64),
                    new.cpu_score,
                    new.entropy_score,
                    new.confidence_score,
                ],
            )?;
            tx.commit()?;
            Ok(id)
        })?;

        self.get_incident_by_row_id(id)?
            .ok_or_else(|| LedgerError::NotFound(format!("incident row {id}")))
    }

    /// Look an incident up by its external UUID.
    pub fn get_incident(&self, incident_id: &str) -> Result<Option<Incident>, LedgerError> {
        self.query_incident("SELECT * FROM incidents WHERE incident_id = ?1", incident_id)
    }

    fn get_incident_by_row_id(&self, id: i64) -> Result<Option<Incident>, LedgerError> {
        self.query_incident("SELECT * FROM incidents WHERE id = ?1", id)
    }

    fn query_incident<P: rusqlite::ToSql>(
        &self,
        sql: &str,
        param: P,
    ) -> Result<Option<Incident>, LedgerError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let mut rows = stmt.query(params![param])?;
            match rows.next()? {
                Some(row) => Ok(Some(self.row_to_incident(row)?)),
                None => Ok(None),
            }
        })
    }

    /// Newest-first incident page; cursor semantics match the timeline.
    pub fn list_incidents(
        &self,
        limit: Option<usize>,
        cursor: i64,
    ) -> Result<Page<Incident>, LedgerError> {
        let limit = check_limit(limit)?;
        let cursor = check_cursor(cursor)?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM incidents
                 WHERE (?1 = 0 OR id < ?1)
                 ORDER BY id DESC LIMIT ?2",
            )?;
            let mut rows = stmt.query(params![cursor, limit as i64 + 1])?;
            let mut items = Vec::new();
            while let Some(row) = rows.next()? {
                items.push(self.row_to_incident(row)?);
            }
            let has_more = items.len() > limit;
            items.truncate(limit);
            let next_cursor = if has_more { items.last().map(|i| i.id) } else { None };
            Ok(Page { items, next_cursor, has_more, limit })
        })
    }

    fn row_to_incident(&self, row: &Row<'_>) -> rusqlite::Result<Incident> {
        Ok(Incident {
            id: row.get("id")?,
            timestamp: row.get("timestamp")?,
            command: self.cipher().open(&row.get::<_, String>("command")?),
            model_name: row.get("model_name")?,
            exit_reason: row.get("exit_reason")?,
            max_cpu: row.get("max_cpu")?,
            pattern: self.cipher().open(&row.get::<_, String>("pattern")?),
            token_savings_estimate: row.get("token_savings_estimate")?,
            reason: row.get("reason")?,
            cpu_score: row.get("cpu_score")?,
            entropy_score: row.get("entropy_score")?,
            confidence_score: row.get("confidence_score")?,
            recovery_status: row.get("recovery_status")?,
            restart_count: row.get("restart_count")?,
            incident_id: row.get("incident_id")?,
        })
    }
}

#[cfg(test)]
#[path = "incidents_tests.rs"]
mod tests;
