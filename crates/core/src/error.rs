//! Error taxonomy for the history core.
//!
//! The variants map directly onto the caller-visible failure classes:
//! `Unauthenticated` and `InvalidInput` are hard failures of the request,
//! `NotFound` is the ownership-checked miss for get/delete, and
//! `StorageUnavailable` is the recoverable class the service degrades on.
//! Normalization outcomes are deliberately *not* errors; they travel as data
//! (`NormalizeStatus`) because a degraded parse is still a stored, visible
//! result.

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("authentication failed: {0}")]
    Unauthenticated(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("history entry not found")]
    NotFound,
    #[error("history storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<std::io::Error> for HistoryError {
    fn from(e: std::io::Error) -> Self {
        HistoryError::StorageUnavailable(e.to_string())
    }
}

pub type HistoryResult<T> = std::result::Result<T, HistoryError>;
