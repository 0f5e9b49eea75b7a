use arbor_store::StoreError;
use arbor_types::{ArtifactKind, ObjectId, ObjectKind, TypeError};

/// Errors from object model operations.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    /// Malformed id or unknown kind tag.
    #[error("invalid object id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    /// An id's tag disagrees with the kind the caller asked for.
    #[error("kind mismatch for {id}: expected {expected}, found {actual}")]
    KindMismatch {
        id: ObjectId,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    /// A graph view points at a node of a different kind.
    #[error("graph node {index} is a {actual}, expected a {expected}")]
    NodeKindMismatch {
        index: usize,
        expected: ArtifactKind,
        actual: ArtifactKind,
    },

    /// The handle has no data for this id.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A `..` component tried to ascend above the resolution root.
    #[error("path {path:?} is external to the directory")]
    PathIsExternal { path: String },

    /// `Directory::get` found nothing at the path.
    #[error("no entry at path {path:?}")]
    EntryNotFound { path: String },

    #[error("invalid symlink: {reason}")]
    InvalidSymlink { reason: String },

    /// An edge references a node index outside the graph.
    #[error("invalid graph index {index}: the graph has {len} nodes")]
    InvalidGraphIndex { index: usize, len: usize },

    #[error("invalid entry name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A pointer, dependency, or referent string could not be parsed.
    #[error("invalid reference {reference:?}: {reason}")]
    InvalidReference { reference: String, reason: String },

    /// A body was encoded while one of its children had no id yet.
    #[error("{kind} child has no id; children must be identified before their parent is encoded")]
    MissingChildId { kind: ObjectKind },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Serialization or deserialization of canonical data failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<TypeError> for ObjectError {
    fn from(e: TypeError) -> Self {
        match e {
            TypeError::InvalidId { id, reason } => Self::InvalidId { id, reason },
            other => Self::InvalidValue(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ObjectError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for object model operations.
pub type ObjectResult<T> = Result<T, ObjectError>;
