//! Error types for grant-reconcile

use thiserror::Error;

use crate::remote::BackendError;
use crate::session::SessionState;
use crate::subject::Provenance;

/// The main error type for reconciliation operations.
///
/// Expected backend conflicts (stale subject, deleted object, missing
/// approval process) are not errors: the session resolves them into a
/// [`SubmitOutcome`](crate::session::SubmitOutcome).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GrantError {
    /// A newly staged subject has no permissions. Raised before any backend call.
    #[error("must set access permissions for: {}", .0.join(", "))]
    MissingPermissions(Vec<String>),

    /// A request carries nothing to approve
    #[error("no changes to submit")]
    NoChanges,

    #[error("subject '{0}' is already in the working set")]
    DuplicateSubject(String),

    #[error("subject '{subject_id}' cannot be removed ({provenance:?})")]
    NotRemovable {
        subject_id: String,
        provenance: Provenance,
    },

    #[error("operation not allowed while session is {0:?}")]
    InvalidState(SessionState),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("remote: {0}")]
    Remote(#[from] BackendError),

    #[error("config: {0}")]
    Config(String),

    #[error("io: {0}")]
    Io(String),
}

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, GrantError>;

impl From<std::io::Error> for GrantError {
    fn from(e: std::io::Error) -> Self {
        GrantError::Io(e.to_string())
    }
}
