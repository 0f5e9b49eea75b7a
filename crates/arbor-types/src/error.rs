use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("invalid object kind: {0:?}")]
    InvalidKind(String),

    #[error("{kind} is not an artifact kind")]
    NotAnArtifact { kind: String },
}
