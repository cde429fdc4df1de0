//! Unified timeline reads: cursor pagination, incident correlation and
//! request-scoped lookups.

use super::{check_cursor, check_limit, row_to_unified, Ledger, TimelinePage};
use crate::error::LedgerError;
use flowforge_core::UnifiedEvent;
use rusqlite::params;

impl Ledger {
    /// Events strictly older than `cursor` (newest-first when `cursor` is 0),
    /// up to `limit`, plus next cursor and `has_more`.
    pub fn timeline_page(
        &self,
        limit: Option<usize>,
        cursor: i64,
    ) -> Result<TimelinePage, LedgerError> {
        let limit = check_limit(limit)?;
        let cursor = check_cursor(cursor)?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM events
                 WHERE (?1 = 0 OR id < ?1)
                 ORDER BY id DESC LIMIT ?2",
            )?;
            let mut rows = stmt.query(params![cursor, limit as i64 + 1])?;
            let mut items = Vec::new();
            while let Some(row) = rows.next()? {
                items.push(row_to_unified(row)?);
            }
            let has_more = items.len() > limit;
            items.truncate(limit);
            let next_cursor = if has_more {
                // Cursor continues from the oldest row on this page.
                last_row_id(conn, &items)?
            } else {
                None
            };
            Ok(TimelinePage { items, next_cursor, has_more, limit })
        })
    }

    /// All event kinds correlated to one incident, `created_at asc, id asc`.
    pub fn incident_timeline(
        &self,
        incident_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<UnifiedEvent>, LedgerError> {
        let limit = check_limit(limit)?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM events
                 WHERE incident_id = ?1
                 ORDER BY created_at ASC, id ASC LIMIT ?2",
            )?;
            let mut rows = stmt.query(params![incident_id, limit as i64])?;
            let mut items = Vec::new();
            while let Some(row) = rows.next()? {
                items.push(row_to_unified(row)?);
            }
            Ok(items)
        })
    }

    /// Causal chain for one request id, insertion order.
    pub fn events_by_request(
        &self,
        request_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<UnifiedEvent>, LedgerError> {
        let limit = check_limit(limit)?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM events
                 WHERE request_id = ?1
                 ORDER BY id ASC LIMIT ?2",
            )?;
            let mut rows = stmt.query(params![request_id, limit as i64])?;
            let mut items = Vec::new();
            while let Some(row) = rows.next()? {
                items.push(row_to_unified(row)?);
            }
            Ok(items)
        })
    }
}

/// Row id of the last (oldest) item on a newest-first page.
fn last_row_id(
    conn: &rusqlite::Connection,
    items: &[UnifiedEvent],
) -> Result<Option<i64>, LedgerError> {
    let Some(last) = items.last() else {
        return Ok(None);
    };
    let id: i64 = conn.query_row(
        "SELECT id FROM events WHERE event_id = ?1",
        params![last.event_id.as_str()],
        |row| row.get(0),
    )?;
    Ok(Some(id))
}

#[cfg(test)]
#[path = "timeline_tests.rs"]
mod tests;
