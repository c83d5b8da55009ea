use crate::status::AgreementStatus;
use thiserror::Error;

/// Workspace-wide error taxonomy.
///
/// The engine itself never returns these; they exist for the collaborators
/// that persist engine output. All variants are recoverable.
#[derive(Debug, Error)]
pub enum AccordError {
    /// The requested transition is not in the catalog for this caller.
    #[error("Transition denied: {0}")]
    TransitionDenied(String),

    /// Optimistic concurrency check failed; the caller must re-read and
    /// recompute before retrying.
    #[error("Stale write on agreement '{agreement_id}': expected revision {expected}, found {actual}")]
    RevisionConflict {
        agreement_id: String,
        expected: u64,
        actual: u64,
    },

    /// A signature already exists for this identity in this role.
    #[error("Already signed as {role}")]
    AlreadySigned { role: &'static str },

    /// A transition marked `requires_input` was attempted with none.
    #[error("Action '{action}' requires input")]
    InputRequired { action: &'static str },

    #[error("Agreement '{0}' not found")]
    NotFound(String),

    #[error("Agreement '{0}' already exists")]
    AlreadyExists(String),

    #[error("Audit trail error: {0}")]
    Audit(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AccordError {
    pub fn denied(from: AgreementStatus, to: AgreementStatus) -> Self {
        Self::TransitionDenied(format!("Cannot transition from {from} to {to}"))
    }

    pub fn action_unavailable(action: &str, status: AgreementStatus) -> Self {
        Self::TransitionDenied(format!(
            "Action '{action}' is not available while the agreement is {status}"
        ))
    }
}
