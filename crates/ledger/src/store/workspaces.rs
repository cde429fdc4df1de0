//! Registry of external integration workspaces referenced by readiness
//! probes (Postgres, Redis, NATS, MinIO endpoints an operator has wired up).

use super::Ledger;
use crate::error::LedgerError;
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationWorkspace {
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub endpoint: String,
    pub created_at: String,
}

impl Ledger {
    /// Register (or refresh) an integration workspace endpoint.
    pub fn upsert_integration_workspace(
        &self,
        name: &str,
        kind: &str,
        endpoint: &str,
        now: &str,
    ) -> Result<(), LedgerError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO integration_workspaces (name, kind, endpoint, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (name) DO UPDATE SET
                     kind = excluded.kind,
                     endpoint = excluded.endpoint",
                params![name, kind, endpoint, now],
            )?;
            Ok(())
        })
    }

    pub fn list_integration_workspaces(
        &self,
    ) -> Result<Vec<IntegrationWorkspace>, LedgerError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, kind, endpoint, created_at
                 FROM integration_workspaces ORDER BY name",
            )?;
            let mut rows = stmt.query([])?;
            let mut items = Vec::new();
            while let Some(row) = rows.next()? {
                items.push(IntegrationWorkspace {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    kind: row.get(2)?,
                    endpoint: row.get(3)?,
                    created_at: row.get(4)?,
                });
            }
            Ok(items)
        })
    }
}

#[cfg(test)]
#[path = "workspaces_tests.rs"]
mod tests;
