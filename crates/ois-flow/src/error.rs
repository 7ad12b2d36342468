//! Orchestrator error types.

use thiserror::Error;

use ois_case::{CaseId, StoreError};

/// Infrastructure failure that prevents a case from even recording its
/// outcome. Business failures (validation, exhausted retries, timeouts)
/// are recorded in the case log and returned as outcomes, not errors.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Case {0} does not exist")]
    UnknownCase(CaseId),

    #[error("Case {case_id} is in state {status} which cannot be resumed")]
    NotResumable { case_id: CaseId, status: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
