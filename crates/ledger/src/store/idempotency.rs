//! Idempotency replay cache. The raw key is hashed before it touches the
//! database; a matching `(key_hash, fingerprint)` replays the stored
//! response verbatim, a differing fingerprint is a conflict.

use super::Ledger;
use crate::error::LedgerError;
use flowforge_core::IdempotencyRecord;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hash an operator-supplied idempotency key for storage.
pub fn hash_key(raw_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"idempotency-key:");
    hasher.update(raw_key.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Fingerprint of the canonical request body.
pub fn fingerprint(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}

/// Result of recording an idempotent mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyOutcome {
    /// First time this key was seen; the response was stored.
    Inserted,
    /// Same key and fingerprint seen before: replay the stored response.
    Replayed(IdempotencyRecord),
}

/// One day of replay/conflict counts for the control-plane history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDayCount {
    pub day: String,
    pub requests: i64,
    pub replays: i64,
    pub conflicts: i64,
}

impl Ledger {
    /// Insert, replay, or conflict for `(scope, raw_key, fingerprint)`.
    pub fn record_idempotent(
        &self,
        scope: &str,
        raw_key: &str,
        request_fingerprint: &str,
        status_code: u16,
        response_body: &str,
        now: &str,
    ) -> Result<IdempotencyOutcome, LedgerError> {
        let key_hash = hash_key(raw_key);
        self.with_conn(|conn| {
            let existing: Option<IdempotencyRecord> = conn
                .query_row(
                    "SELECT key_hash, scope, request_fingerprint, status_code,
                            response_body, created_at
                     FROM idempotency_records WHERE scope = ?1 AND key_hash = ?2",
                    params![scope, key_hash],
                    |row| {
                        Ok(IdempotencyRecord {
                            key_hash: row.get(0)?,
                            scope: row.get(1)?,
                            request_fingerprint: row.get(2)?,
                            status_code: row.get::<_, i64>(3)? as u16,
                            response_body: row.get(4)?,
                            created_at: row.get(5)?,
                        })
                    },
                )
                .optional()?;

            match existing {
                None => {
                    conn.execute(
                        "INSERT INTO idempotency_records
                             (key_hash, scope, request_fingerprint, status_code,
                              response_body, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            key_hash,
                            scope,
                            request_fingerprint,
                            status_code as i64,
                            response_body,
                            now,
                        ],
                    )?;
                    Ok(IdempotencyOutcome::Inserted)
                }
                Some(record) if record.request_fingerprint == request_fingerprint => {
                    conn.execute(
                        "UPDATE idempotency_records SET replay_count = replay_count + 1
                         WHERE scope = ?1 AND key_hash = ?2",
                        params![scope, key_hash],
                    )?;
                    Ok(IdempotencyOutcome::Replayed(record))
                }
                Some(_) => {
                    conn.execute(
                        "UPDATE idempotency_records SET conflict_count = conflict_count + 1
                         WHERE scope = ?1 AND key_hash = ?2",
                        params![scope, key_hash],
                    )?;
                    Err(LedgerError::IdempotencyConflict)
                }
            }
        })
    }

    /// Look a stored record up without mutating counters.
    pub fn get_idempotency_record(
        &self,
        scope: &str,
        raw_key: &str,
    ) -> Result<Option<IdempotencyRecord>, LedgerError> {
        let key_hash = hash_key(raw_key);
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT key_hash, scope, request_fingerprint, status_code,
                            response_body, created_at
                     FROM idempotency_records WHERE scope = ?1 AND key_hash = ?2",
                    params![scope, key_hash],
                    |row| {
                        Ok(IdempotencyRecord {
                            key_hash: row.get(0)?,
                            scope: row.get(1)?,
                            request_fingerprint: row.get(2)?,
                            status_code: row.get::<_, i64>(3)? as u16,
                            response_body: row.get(4)?,
                            created_at: row.get(5)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    /// Per-UTC-day replay/conflict counts for the last `days` days (capped at
    /// 90), newest first. `now` anchors the window so the query is testable.
    pub fn replay_history(
        &self,
        days: u32,
        now: &str,
    ) -> Result<Vec<ReplayDayCount>, LedgerError> {
        let days = days.clamp(1, 90);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT substr(created_at, 1, 10) AS day,
                        COUNT(*) AS requests,
                        SUM(replay_count) AS replays,
                        SUM(conflict_count) AS conflicts
                 FROM idempotency_records
                 WHERE date(created_at) > date(?1, '-' || ?2 || ' days')
                 GROUP BY day ORDER BY day DESC",
            )?;
            let mut rows = stmt.query(params![now, days])?;
            let mut counts = Vec::new();
            while let Some(row) = rows.next()? {
                counts.push(ReplayDayCount {
                    day: row.get(0)?,
                    requests: row.get(1)?,
                    replays: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                    conflicts: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                });
            }
            Ok(counts)
        })
    }
}

#[cfg(test)]
#[path = "idempotency_tests.rs"]
mod tests;
