// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! flowforge-ledger: durable append-only store of incidents, audits, decision
//! traces and the unified timeline, plus the idempotency replay cache.
//!
//! Single embedded SQLite file. Writes serialize behind one connection lock;
//! the `events` table is guarded by append-only triggers. Sensitive columns
//! are sanitized before persistence and encrypted at rest when a master key
//! is configured.

pub mod crypto;
pub mod error;
pub mod schema;
pub mod store;

pub use crypto::{ColumnCipher, EncryptionPolicy};
pub use error::LedgerError;
pub use store::{
    fingerprint, hash_key, IdempotencyOutcome, IntegrationWorkspace, Ledger, NewAudit,
    NewDecisionTrace, NewIncident, Page, ReplayDayCount, TimelinePage, TraceFilter,
    DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
};
