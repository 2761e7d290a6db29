//! Audit trail writes for upsert outcomes.

use tracing::warn;

use crate::errors::GraphResult;
use crate::models::{AuditRecord, OutcomeKind, UpsertOutcome};
use crate::store::{GraphSession, GraphStore};

/// Write one audit row per non-SKIP outcome inside the caller's transaction.
pub fn record_outcomes(
    session: &mut dyn GraphSession,
    outcomes: &[UpsertOutcome],
) -> GraphResult<usize> {
    let mut written = 0;
    for outcome in outcomes.iter().filter(|o| o.kind != OutcomeKind::Skip) {
        session.record_audit(&AuditRecord::from_outcome(outcome))?;
        written += 1;
    }
    Ok(written)
}

/// Best-effort audit of a rolled-back batch in a fresh transaction. Errors
/// are logged, never returned: the batch has already failed.
pub fn record_failures(store: &dyn GraphStore, outcomes: &[UpsertOutcome]) {
    let mut session = match store.begin() {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "cannot open session for failure audit");
            return;
        }
    };
    if let Err(e) = record_outcomes(&mut *session, outcomes) {
        warn!(error = %e, "failure audit not recorded");
        if let Err(e) = session.rollback() {
            warn!(error = %e, "rollback of failure audit failed");
        }
        return;
    }
    if let Err(e) = session.commit() {
        warn!(error = %e, "failure audit not committed");
    }
}
