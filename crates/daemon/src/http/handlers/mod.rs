//! Route handlers, grouped by surface.

pub mod health;
pub mod incidents;
pub mod ops;
pub mod process;

use super::problem::Problem;
use flowforge_ledger::LedgerError;

/// Map a ledger error onto its problem document.
pub(crate) fn ledger_problem(e: LedgerError, instance: &str, request_id: &str) -> Problem {
    let problem = match &e {
        LedgerError::Validation { field, message } => {
            Problem::validation(format!("{field}: {message}"))
        }
        LedgerError::IdempotencyConflict => Problem::idempotency_conflict(),
        LedgerError::NotFound(what) => Problem::not_found(what.clone()),
        LedgerError::Init(_) => Problem::internal("database not initialized"),
        _ => Problem::internal(e.to_string()),
    };
    problem.instance(instance).request_id(request_id)
}
