use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Lowest grade a tutoring subject may be restricted to
pub const DEFAULT_MIN_GRADE: u8 = 1;
/// Highest grade a tutoring subject may be restricted to
pub const DEFAULT_MAX_GRADE: u8 = 13;

/// Inclusive grade range a subject is offered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeRange {
    pub min: u8,
    pub max: u8,
}

impl GradeRange {
    pub fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    /// Inclusive containment check
    #[inline]
    pub fn contains(&self, grade: u8) -> bool {
        grade >= self.min && grade <= self.max
    }
}

impl Default for GradeRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_GRADE,
            max: DEFAULT_MAX_GRADE,
        }
    }
}

/// Subject with the grades it can be tutored for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub grades: GradeRange,
}

impl Subject {
    pub fn new(name: impl Into<String>, min: u8, max: u8) -> Self {
        Self {
            name: name.into(),
            grades: GradeRange::new(min, max),
        }
    }
}

/// Neutral candidate shape shared by both sides of the matching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: i64,
    #[serde(rename = "externalRef")]
    pub external_ref: String,
    #[serde(rename = "requestCount")]
    pub request_count: u32,
    pub subjects: Vec<Subject>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// When the candidate started waiting. With several open requests only the
    /// first one is tracked, so the waiting time of later requests is overestimated.
    #[serde(rename = "firstRequestAt")]
    pub first_request_at: DateTime<Utc>,
    #[serde(rename = "excludeRefs", default)]
    pub exclude_refs: HashSet<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl Candidate {
    pub fn excludes(&self, external_ref: &str) -> bool {
        self.exclude_refs.contains(external_ref)
    }
}

/// Tutor side of the matching
pub type Helper = Candidate;

/// Learner side of the matching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Helpee {
    #[serde(flatten)]
    pub candidate: Candidate,
    #[serde(default)]
    pub priority: i32,
    /// `None` when the stored grade could not be interpreted
    #[serde(default)]
    pub grade: Option<u8>,
}

/// Balancing coefficients applied to the normalized scoring factors
///
/// Unset coefficients are zero, so a pool without weights scores every
/// compatible pair the same.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchingWeights {
    #[serde(rename = "subjectMatching", alias = "subject_matching", default)]
    pub subject_matching: f64,
    #[serde(default)]
    pub state: f64,
    #[serde(rename = "waitingTime", alias = "waiting_time", default)]
    pub waiting_time: f64,
    #[serde(rename = "matchingPriority", alias = "matching_priority", default)]
    pub matching_priority: f64,
}

impl MatchingWeights {
    /// Every coefficient set to one
    pub fn balanced() -> Self {
        Self {
            subject_matching: 1.0,
            state: 1.0,
            waiting_time: 1.0,
            matching_priority: 1.0,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("subject_matching", self.subject_matching),
            ("state", self.state),
            ("waiting_time", self.waiting_time),
            ("matching_priority", self.matching_priority),
        ]
        .into_iter()
    }
}

/// One computed helper/helpee pairing, before persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(rename = "helperId")]
    pub helper_id: i64,
    #[serde(rename = "helperRef")]
    pub helper_ref: String,
    #[serde(rename = "helpeeId")]
    pub helpee_id: i64,
    #[serde(rename = "helpeeRef")]
    pub helpee_ref: String,
    pub score: f64,
}

/// Which population a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Helper,
    Helpee,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Helper => write!(f, "helper"),
            Side::Helpee => write!(f, "helpee"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_range_is_inclusive() {
        let range = GradeRange::new(5, 9);
        assert!(range.contains(5));
        assert!(range.contains(9));
        assert!(!range.contains(4));
        assert!(!range.contains(10));
    }

    #[test]
    fn test_default_range_is_widest() {
        let range = GradeRange::default();
        assert_eq!(range.min, 1);
        assert_eq!(range.max, 13);
    }

    #[test]
    fn test_weights_default_to_zero() {
        let weights: MatchingWeights = serde_json::from_str(r#"{"state": 2.0}"#).unwrap();
        assert_eq!(weights.state, 2.0);
        assert_eq!(weights.subject_matching, 0.0);
        assert_eq!(weights.waiting_time, 0.0);
        assert_eq!(weights.matching_priority, 0.0);
    }
}
