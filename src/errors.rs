use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid extended JSON: {0}")]
    InvalidJson(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Collection not found: {0}")]
    NoSuchCollection(String),

    #[error("Invalid document ID: {0}")]
    InvalidDocumentId(String),

    /// An insert collided with an existing identifier. Documents before `position`
    /// in the same batch stay inserted.
    #[error(
        "duplicate _id {id} in collection {collection} at batch position {position} ({inserted} inserted before it)"
    )]
    DuplicateKey { collection: String, id: String, position: usize, inserted: usize },

    /// A batch element was rejected before insertion (for example a non-ObjectId `_id`).
    /// Documents before `position` stay inserted.
    #[error("invalid document in collection {collection} at batch position {position} ({inserted} inserted before it): {reason}")]
    InvalidBatchDocument { collection: String, position: usize, inserted: usize, reason: String },

    /// A stage descriptor is structurally invalid. Raised while the pipeline is built,
    /// before any document is read.
    #[error("invalid {kind} stage at index {index}: {reason}")]
    InvalidStage { index: usize, kind: String, reason: String },

    #[error("Query error: {0}")]
    QueryError(String),
}

impl DbError {
    pub(crate) fn stage(index: usize, kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidStage { index, kind: kind.into(), reason: reason.into() }
    }
}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
