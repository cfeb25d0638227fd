use serde::{Deserialize, Serialize};
use crate::core::MatchStats;
use crate::models::domain::{Assignment, MatchingWeights};

/// Wall-clock duration of each run phase in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTiming {
    #[serde(rename = "preparation_ms")]
    pub preparation: u64,
    #[serde(rename = "matching_ms")]
    pub matching: u64,
    #[serde(rename = "commit_ms")]
    pub commit: u64,
}

/// Assignment whose creation callback failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitFailure {
    #[serde(rename = "helperRef")]
    pub helper_ref: String,
    #[serde(rename = "helpeeRef")]
    pub helpee_ref: String,
    pub error: String,
}

/// Outcome of the commit phase
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitReport {
    pub created: usize,
    pub failed: Vec<CommitFailure>,
}

impl CommitReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of one allocation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub pool: String,
    pub applied: bool,
    pub timing: PhaseTiming,
    pub stats: MatchStats,
    #[serde(rename = "dataQualityWarnings")]
    pub data_quality_warnings: usize,
    pub assignments: Vec<Assignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitReport>,
}

/// What the automatic gate did with one pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum PoolOutcome {
    Skipped {
        helpers: u64,
        helpees: u64,
    },
    Completed {
        matched: usize,
        committed: usize,
        failed: usize,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolRunReport {
    pub pool: String,
    #[serde(flatten)]
    pub outcome: PoolOutcome,
}

/// Report of one pass of the automatic gate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomaticRunReport {
    pub pools: Vec<PoolRunReport>,
}

impl AutomaticRunReport {
    pub fn failed(&self) -> usize {
        self.pools
            .iter()
            .filter(|p| matches!(p.outcome, PoolOutcome::Failed { .. }))
            .count()
    }
}

/// Registered pool as shown on the admin surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSummary {
    pub name: String,
    pub weights: MatchingWeights,
    #[serde(rename = "minHelpers")]
    pub min_helpers: Option<u64>,
    #[serde(rename = "minHelpees")]
    pub min_helpees: Option<u64>,
    #[serde(rename = "eligibleHelpers")]
    pub eligible_helpers: u64,
    #[serde(rename = "eligibleHelpees")]
    pub eligible_helpees: u64,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_timing_field_names() {
        let timing = PhaseTiming {
            preparation: 12,
            matching: 3,
            commit: 0,
        };
        let json = serde_json::to_value(timing).unwrap();
        assert_eq!(json, serde_json::json!({ "preparation_ms": 12, "matching_ms": 3, "commit_ms": 0 }));
    }

    #[test]
    fn test_pool_outcome_is_tagged() {
        let report = PoolRunReport {
            pool: "lern-fair-now".to_string(),
            outcome: PoolOutcome::Skipped { helpers: 4, helpees: 6 },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["helpers"], 4);
    }
}
