use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to run a single pool on demand
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RunMatchingRequest {
    #[validate(length(min = 1, max = 128))]
    #[serde(alias = "poolName", rename = "pool")]
    pub pool: String,
    /// Commit the computed pairings; defaults to a dry run
    #[serde(default)]
    pub apply: bool,
}
