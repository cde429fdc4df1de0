//! The ledger store: one SQLite connection behind a writer lock.
//!
//! Every accessor lives in a submodule; they all funnel through
//! [`Ledger::with_conn`] so writes serialize and the connection is never
//! reachable outside this crate.

mod audits;
mod baseline;
mod idempotency;
mod incidents;
mod timeline;
mod traces;
mod workspaces;

pub use idempotency::{fingerprint, hash_key, IdempotencyOutcome, ReplayDayCount};
pub use traces::TraceFilter;
pub use workspaces::IntegrationWorkspace;

use crate::crypto::ColumnCipher;
use crate::error::LedgerError;
use crate::schema;
use flowforge_core::{EventKind, Redactor, UnifiedEvent};
use parking_lot::Mutex;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Upper bound for page limits.
pub const MAX_PAGE_LIMIT: usize = 500;
/// Default page limit when the caller does not specify one.
pub const DEFAULT_PAGE_LIMIT: usize = 100;

/// Cursor-paginated result page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<i64>,
    pub has_more: bool,
    pub limit: usize,
}

/// Page of unified timeline events.
pub type TimelinePage = Page<UnifiedEvent>;

/// New incident to persist (raw values; the store sanitizes and encrypts).
#[derive(Debug, Clone, Default)]
pub struct NewIncident {
    pub run_id: String,
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
    pub incident_id: String,
    pub pid: Option<u32>,
    pub request_id: Option<String>,
}

/// New decision trace to persist. The store computes the replay digest over
/// the canonical input before insert, so a persisted non-legacy trace always
/// carries one.
#[derive(Debug, Clone, Default)]
pub struct NewDecisionTrace {
    pub run_id: String,
    pub command: String,
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
    pub incident_id: Option<String>,
    pub request_id: Option<String>,
}

/// New audit event to persist.
#[derive(Debug, Clone, Default)]
pub struct NewAudit {
    pub run_id: String,
    pub actor: String,
    pub action: String,
    pub details: String,
    pub source: String,
    pub pid: Option<u32>,
    pub command: String,
    pub incident_id: Option<String>,
    pub request_id: Option<String>,
    pub payload: BTreeMap<String, serde_json::Value>,
}

/// Handle to the embedded ledger database.
#[derive(Clone)]
pub struct Ledger {
    conn: Arc<Mutex<Connection>>,
    cipher: ColumnCipher,
    redactor: Redactor,
}

impl Ledger {
    /// Open (or create) the ledger file and apply the schema.
    pub fn open(
        path: &Path,
        cipher: ColumnCipher,
        redactor: Redactor,
    ) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LedgerError::Init(format!("create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| LedgerError::Init(format!("open {}: {e}", path.display())))?;
        schema::init(&conn).map_err(|e| LedgerError::Init(e.to_string()))?;
        tracing::info!(path = %path.display(), policy = ?cipher.policy(), "ledger opened");
        Ok(Self { conn: Arc::new(Mutex::new(conn)), cipher, redactor })
    }

    /// In-memory ledger for tests.
    pub fn open_in_memory(
        cipher: ColumnCipher,
        redactor: Redactor,
    ) -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| LedgerError::Init(e.to_string()))?;
        schema::init(&conn).map_err(|e| LedgerError::Init(e.to_string()))?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)), cipher, redactor })
    }

    pub(crate) fn with_conn<R>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<R, LedgerError>,
    ) -> Result<R, LedgerError> {
        let mut conn = self.conn.lock();
        f(&mut conn)
    }

    pub(crate) fn cipher(&self) -> &ColumnCipher {
        &self.cipher
    }

    pub(crate) fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// Sanitize free-form text before it can reach a row.
    pub(crate) fn sanitize(&self, text: &str) -> String {
        self.redactor.redact(text)
    }
}

/// Validate a user-supplied page limit.
pub(crate) fn check_limit(limit: Option<usize>) -> Result<usize, LedgerError> {
    match limit {
        None => Ok(DEFAULT_PAGE_LIMIT),
        Some(l) if (1..=MAX_PAGE_LIMIT).contains(&l) => Ok(l),
        Some(l) => Err(LedgerError::validation(
            "limit",
            format!("must be between 1 and {MAX_PAGE_LIMIT}, got {l}"),
        )),
    }
}

/// Validate a user-supplied cursor. Zero means "newest first".
pub(crate) fn check_cursor(cursor: i64) -> Result<i64, LedgerError> {
    if cursor < 0 {
        return Err(LedgerError::validation(
            "cursor",
            format!("must be positive, got {cursor}"),
        ));
    }
    Ok(cursor)
}

/// Map a full `events` row to the unified projection.
pub(crate) fn row_to_unified(row: &Row<'_>) -> rusqlite::Result<UnifiedEvent> {
    let event_type: String = row.get("event_type")?;
    let payload: String = row.get("payload")?;
    Ok(UnifiedEvent {
        event_id: flowforge_core::EventId::from_string(row.get::<_, String>("event_id")?),
        created_at: row.get("created_at")?,
        run_id: row.get("run_id")?,
        incident_id: row.get("incident_id")?,
        request_id: row.get("request_id")?,
        event_type: EventKind::from_wire(&event_type).unwrap_or(EventKind::Audit),
        title: row.get("title")?,
        actor: row.get("actor")?,
        reason_text: row.get("reason_text")?,
        summary: row.get("summary")?,
        pid: row.get::<_, Option<i64>>("pid")?.map(|p| p as u32),
        cpu_score: row.get("cpu_score")?,
        entropy_score: row.get("entropy_score")?,
        confidence_score: row.get("confidence_score")?,
        decision_engine: row.get("decision_engine")?,
        engine_version: row.get("engine_version")?,
        decision_contract_version: row.get("decision_contract_version")?,
        rollout_mode: row.get("rollout_mode")?,
        replay_contract_version: row.get("replay_contract_version")?,
        replay_digest: row.get("replay_digest")?,
        payload: serde_json::from_str(&payload).unwrap_or_default(),
    })
}

#[cfg(test)]
pub(crate) fn test_ledger() -> Ledger {
    Ledger::open_in_memory(ColumnCipher::plaintext(), Redactor::new())
        .expect("in-memory ledger")
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
