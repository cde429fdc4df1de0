//! SQLite schema: tables, indexes and the append-only triggers on `events`.

use rusqlite::Connection;

/// Schema creation is idempotent; every statement is IF NOT EXISTS.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS incidents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    command TEXT NOT NULL,
    model_name TEXT NOT NULL DEFAULT '',
    exit_reason TEXT NOT NULL,
    max_cpu REAL NOT NULL DEFAULT 0,
    pattern TEXT NOT NULL DEFAULT '',
    token_savings_estimate REAL NOT NULL DEFAULT 0,
    reason TEXT NOT NULL DEFAULT '',
    cpu_score REAL NOT NULL DEFAULT 0,
    entropy_score REAL NOT NULL DEFAULT 0,
    confidence_score REAL NOT NULL DEFAULT 0,
    recovery_status TEXT NOT NULL DEFAULT '',
    restart_count INTEGER NOT NULL DEFAULT 0,
    incident_id TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    run_id TEXT NOT NULL DEFAULT '',
    incident_id TEXT,
    request_id TEXT,
    event_type TEXT NOT NULL CHECK (event_type IN ('incident','audit','decision','policy_dry_run')),
    title TEXT NOT NULL DEFAULT '',
    actor TEXT NOT NULL DEFAULT '',
    action TEXT NOT NULL DEFAULT '',
    decision TEXT NOT NULL DEFAULT '',
    reason_text TEXT NOT NULL DEFAULT '',
    summary TEXT NOT NULL DEFAULT '',
    details TEXT NOT NULL DEFAULT '',
    source TEXT NOT NULL DEFAULT '',
    command TEXT NOT NULL DEFAULT '',
    pid INTEGER,
    cpu_score REAL NOT NULL DEFAULT 0,
    entropy_score REAL NOT NULL DEFAULT 0,
    confidence_score REAL NOT NULL DEFAULT 0,
    decision_engine TEXT NOT NULL DEFAULT '',
    engine_version TEXT NOT NULL DEFAULT '',
    decision_contract_version TEXT NOT NULL DEFAULT '',
    rollout_mode TEXT NOT NULL DEFAULT '',
    replay_contract_version TEXT NOT NULL DEFAULT '',
    replay_digest TEXT NOT NULL DEFAULT '',
    payload TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_events_incident ON events (incident_id, created_at, id);
CREATE INDEX IF NOT EXISTS idx_events_request ON events (request_id, id);
CREATE INDEX IF NOT EXISTS idx_events_type ON events (event_type, id);

CREATE TABLE IF NOT EXISTS decision_signal_baseline_state (
    bucket_key TEXT PRIMARY KEY,
    latest_trace_id INTEGER NOT NULL,
    consecutive_breach_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    last_transition_at TEXT NOT NULL,
    last_checked_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS integration_workspaces (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL,
    endpoint TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS idempotency_records (
    key_hash TEXT NOT NULL,
    scope TEXT NOT NULL,
    request_fingerprint TEXT NOT NULL,
    status_code INTEGER NOT NULL,
    response_body TEXT NOT NULL,
    created_at TEXT NOT NULL,
    replay_count INTEGER NOT NULL DEFAULT 0,
    conflict_count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (scope, key_hash)
);

CREATE TRIGGER IF NOT EXISTS events_append_only_update
BEFORE UPDATE ON events
BEGIN
    SELECT RAISE(ABORT, 'events are append-only');
END;

CREATE TRIGGER IF NOT EXISTS events_append_only_delete
BEFORE DELETE ON events
BEGIN
    SELECT RAISE(ABORT, 'events are append-only');
END;
"#;

/// Apply pragmas and create the schema.
pub fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    conn.execute_batch(SCHEMA)
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
