use async_trait::async_trait;
use thiserror::Error;
use crate::models::{HelpeeFilter, HelperFilter, RawHelpee, RawHelper, Side};

/// Errors raised by candidate storage
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Errors raised while persisting a single pairing
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Pairing {helper_ref} / {helpee_ref} already exists")]
    Duplicate { helper_ref: String, helpee_ref: String },

    #[error("Pairing rejected: {0}")]
    Rejected(String),
}

/// Read access to both candidate populations
///
/// Implementations apply the global viability check in addition to the
/// given filter. This is the only seam touching persistent candidate data.
#[async_trait]
pub trait CandidateRepository: Send + Sync {
    async fn fetch_helpers(
        &self,
        filter: &HelperFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<RawHelper>, RepositoryError>;

    async fn fetch_helpees(
        &self,
        filter: &HelpeeFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<RawHelpee>, RepositoryError>;

    async fn count_helpers(&self, filter: &HelperFilter) -> Result<u64, RepositoryError>;

    async fn count_helpees(&self, filter: &HelpeeFilter) -> Result<u64, RepositoryError>;

    /// External refs of every counterpart the candidate was ever paired with,
    /// dissolved pairings included
    async fn pairing_history(&self, side: Side, candidate_id: i64) -> Result<Vec<String>, RepositoryError>;
}

/// Creation callback a pool uses to persist a computed pairing
///
/// Responsible for the uniqueness of (helper, helpee) pairings.
#[async_trait]
pub trait MatchCreator: Send + Sync {
    async fn create_match(&self, helpee: &RawHelpee, helper: &RawHelper) -> Result<(), CommitError>;
}
