use thiserror::Error;
use crate::services::RepositoryError;

/// Errors surfaced by pool runs
#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("Unknown pool '{0}'")]
    PoolNotFound(String),

    #[error("Invalid pool configuration: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(#[from] RepositoryError),
}

impl MatchingError {
    /// Configuration problems are never worth retrying
    pub fn is_configuration(&self) -> bool {
        matches!(self, MatchingError::PoolNotFound(_) | MatchingError::Configuration(_))
    }
}
