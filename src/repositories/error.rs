use thiserror::Error;

/// Failures reported by persistence and account collaborators
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The write conflicts with stored state (e.g. settling a settled position)
    #[error("Conflicting update: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}
