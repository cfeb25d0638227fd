use serde::{Deserialize, Serialize};
use crate::core::{
    assignment::max_weight_assignment_by,
    compatibility::{check_pair, PairCheck},
    scoring::{calculate_pair_score, BatchContext},
};
use crate::models::{Assignment, Helpee, Helper, MatchingWeights};

/// Upper bound of a single pair score under `weights`
///
/// Every factor is normalized to 0-1, so a pair scores at most the sum of the
/// coefficients.
#[inline]
pub fn max_pair_score(weights: &MatchingWeights) -> f64 {
    weights.iter().map(|(_, w)| w.max(0.0)).sum()
}

/// Edge weight of a compatible pair in a batch allowing `capacity` pairs
///
/// Pairs are ranked lexicographically: more assignments first, then the
/// higher total score. The score is rescaled to 0-1 by `max_score`, so the
/// outcome does not change when all coefficients are multiplied by the same
/// factor. The bonus `capacity + 1` exceeds any total of rescaled scores, so
/// one additional pair always outweighs a better scored smaller matching.
#[inline]
pub fn edge_weight(score: f64, max_score: f64, capacity: usize) -> f64 {
    let normalized = if max_score > 0.0 {
        (score / max_score).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (capacity + 1) as f64 + normalized
}

/// Why candidates of one side were left unmatched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedBreakdown {
    /// No open request left
    #[serde(rename = "noOpenRequest")]
    pub no_open_request: usize,
    /// Only partners that fit were excluded by pairing history
    pub excluded: usize,
    /// A subject was shared, but never for the helpee's grade
    #[serde(rename = "gradeMismatch")]
    pub grade_mismatch: usize,
    #[serde(rename = "noSharedSubject")]
    pub no_shared_subject: usize,
    /// Had compatible partners, all of them went to others
    pub capacity: usize,
}

impl UnmatchedBreakdown {
    pub fn total(&self) -> usize {
        self.no_open_request + self.excluded + self.grade_mismatch + self.no_shared_subject + self.capacity
    }
}

/// Statistics of one engine run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchStats {
    #[serde(rename = "helperCount")]
    pub helper_count: usize,
    #[serde(rename = "helpeeCount")]
    pub helpee_count: usize,
    #[serde(rename = "matchCount")]
    pub match_count: usize,
    #[serde(rename = "averageScore")]
    pub average_score: f64,
    #[serde(rename = "compatiblePairs")]
    pub compatible_pairs: usize,
    #[serde(rename = "excludedPairs")]
    pub excluded_pairs: usize,
    #[serde(rename = "gradeMismatchPairs")]
    pub grade_mismatch_pairs: usize,
    #[serde(rename = "unmatchedHelpers")]
    pub unmatched_helpers: UnmatchedBreakdown,
    #[serde(rename = "unmatchedHelpees")]
    pub unmatched_helpees: UnmatchedBreakdown,
}

/// Result of the matching process
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub assignments: Vec<Assignment>,
    pub stats: MatchStats,
}

/// Best pair status seen for a candidate, ordered from worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Reach {
    NoOpenRequest,
    Pair(PairCheck),
}

/// Allocation engine computing exclusive helper/helpee pairings
///
/// # Stages
/// 1. Canonical ordering of both sides by id
/// 2. Compatibility check of every pair
/// 3. Scoring of compatible pairs
/// 4. Maximum-weight bipartite assignment
#[derive(Debug, Clone)]
pub struct Matcher {
    weights: MatchingWeights,
}

impl Matcher {
    pub fn new(weights: MatchingWeights) -> Self {
        Self { weights }
    }

    /// Compute a one-to-one assignment with the most pairs, and among those
    /// the highest total score
    ///
    /// Pure and deterministic: the order in which candidates are passed in has
    /// no effect on the result. Empty input yields an empty result.
    pub fn run(&self, mut helpers: Vec<Helper>, mut helpees: Vec<Helpee>) -> MatchResult {
        helpers.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.external_ref.cmp(&b.external_ref)));
        helpees.sort_by(|a, b| {
            a.candidate
                .id
                .cmp(&b.candidate.id)
                .then_with(|| a.candidate.external_ref.cmp(&b.candidate.external_ref))
        });

        let mut stats = MatchStats {
            helper_count: helpers.len(),
            helpee_count: helpees.len(),
            ..MatchStats::default()
        };

        let mut helper_reach: Vec<Reach> = helpers.iter().map(|h| reach_for(h.request_count)).collect();
        let mut helpee_reach: Vec<Reach> = helpees.iter().map(|h| reach_for(h.candidate.request_count)).collect();

        let ctx = match BatchContext::from_candidates(&helpers, &helpees) {
            Some(ctx) => ctx,
            None => {
                stats.unmatched_helpers = classify(&helper_reach, &[]);
                stats.unmatched_helpees = classify(&helpee_reach, &[]);
                return MatchResult { assignments: Vec::new(), stats };
            }
        };

        let mut scores: Vec<Vec<Option<f64>>> = vec![vec![None; helpees.len()]; helpers.len()];

        for (i, helper) in helpers.iter().enumerate() {
            if helper.request_count == 0 {
                continue;
            }

            for (j, helpee) in helpees.iter().enumerate() {
                if helpee.candidate.request_count == 0 {
                    continue;
                }

                let check = check_pair(helper, helpee);
                match check {
                    PairCheck::Compatible => {
                        stats.compatible_pairs += 1;
                        let score = calculate_pair_score(helper, helpee, &ctx, &self.weights);
                        scores[i][j] = Some(score);
                    }
                    PairCheck::Excluded => stats.excluded_pairs += 1,
                    PairCheck::GradeMismatch => stats.grade_mismatch_pairs += 1,
                    PairCheck::NoSharedSubject => {}
                }

                helper_reach[i] = helper_reach[i].max(Reach::Pair(check));
                helpee_reach[j] = helpee_reach[j].max(Reach::Pair(check));
            }
        }

        let capacity = helpers.len().min(helpees.len());
        let max_score = max_pair_score(&self.weights);
        let pairs = max_weight_assignment_by(helpers.len(), helpees.len(), |i, j| {
            scores[i][j].map(|s| edge_weight(s, max_score, capacity))
        });

        let mut helper_matched = vec![false; helpers.len()];
        let mut helpee_matched = vec![false; helpees.len()];

        let assignments: Vec<Assignment> = pairs
            .into_iter()
            .filter_map(|(i, j)| {
                let score = scores[i][j]?;
                helper_matched[i] = true;
                helpee_matched[j] = true;
                Some(Assignment {
                    helper_id: helpers[i].id,
                    helper_ref: helpers[i].external_ref.clone(),
                    helpee_id: helpees[j].candidate.id,
                    helpee_ref: helpees[j].candidate.external_ref.clone(),
                    score,
                })
            })
            .collect();

        stats.match_count = assignments.len();
        if !assignments.is_empty() {
            let total: f64 = assignments.iter().map(|a| a.score).sum();
            stats.average_score = total / assignments.len() as f64;
        }
        stats.unmatched_helpers = classify(&helper_reach, &helper_matched);
        stats.unmatched_helpees = classify(&helpee_reach, &helpee_matched);

        tracing::debug!(
            "Matched {} of {} helpers and {} helpees ({} compatible pairs)",
            stats.match_count,
            stats.helper_count,
            stats.helpee_count,
            stats.compatible_pairs
        );

        MatchResult { assignments, stats }
    }
}

#[inline]
fn reach_for(request_count: u32) -> Reach {
    if request_count == 0 {
        Reach::NoOpenRequest
    } else {
        Reach::Pair(PairCheck::NoSharedSubject)
    }
}

/// Tally unmatched candidates by the best pair they could have formed
fn classify(reach: &[Reach], matched: &[bool]) -> UnmatchedBreakdown {
    let mut breakdown = UnmatchedBreakdown::default();

    for (idx, r) in reach.iter().enumerate() {
        if matched.get(idx).copied().unwrap_or(false) {
            continue;
        }

        match r {
            Reach::NoOpenRequest => breakdown.no_open_request += 1,
            Reach::Pair(PairCheck::NoSharedSubject) => breakdown.no_shared_subject += 1,
            Reach::Pair(PairCheck::GradeMismatch) => breakdown.grade_mismatch += 1,
            Reach::Pair(PairCheck::Excluded) => breakdown.excluded += 1,
            Reach::Pair(PairCheck::Compatible) => breakdown.capacity += 1,
        }
    }

    breakdown
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(MatchingWeights::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, Subject};
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashSet;

    fn create_helper(id: i64, subjects: Vec<Subject>, state: &str) -> Helper {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::days(id);
        Candidate {
            id,
            external_ref: format!("student-{}", id),
            request_count: 1,
            subjects,
            created_at: at,
            first_request_at: at,
            exclude_refs: HashSet::new(),
            state: Some(state.to_string()),
        }
    }

    fn create_helpee(id: i64, subject: &str, grade: u8, state: &str) -> Helpee {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::days(id);
        Helpee {
            candidate: Candidate {
                id,
                external_ref: format!("pupil-{}", id),
                request_count: 1,
                subjects: vec![Subject::new(subject, 1, 13)],
                created_at: at,
                first_request_at: at,
                exclude_refs: HashSet::new(),
                state: Some(state.to_string()),
            },
            priority: 0,
            grade: Some(grade),
        }
    }

    #[test]
    fn test_empty_sides_produce_no_assignments() {
        let matcher = Matcher::new(MatchingWeights::balanced());
        let helpers = vec![create_helper(1, vec![Subject::new("Mathematik", 1, 13)], "be")];

        let result = matcher.run(helpers, vec![]);
        assert!(result.assignments.is_empty());
        assert_eq!(result.stats.helper_count, 1);
        assert_eq!(result.stats.unmatched_helpers.no_shared_subject, 1);

        let result = matcher.run(vec![], vec![]);
        assert!(result.assignments.is_empty());
        assert_eq!(result.stats, MatchStats::default());
    }

    #[test]
    fn test_unweighted_pool_still_matches_compatible_pairs() {
        let matcher = Matcher::default();
        let helpers = vec![create_helper(1, vec![Subject::new("Mathematik", 1, 13)], "be")];
        let helpees = vec![create_helpee(1, "Mathematik", 7, "nw")];

        let result = matcher.run(helpers, helpees);
        assert_eq!(result.assignments.len(), 1);
        assert_eq!(result.assignments[0].score, 0.0);
    }

    #[test]
    fn test_stats_breakdown() {
        let matcher = Matcher::new(MatchingWeights::balanced());
        let mut excluded = create_helper(1, vec![Subject::new("Deutsch", 1, 13)], "be");
        excluded.exclude_refs.insert("pupil-3".to_string());
        let helpers = vec![
            excluded,
            create_helper(2, vec![Subject::new("Mathematik", 10, 13)], "be"),
            create_helper(3, vec![Subject::new("Englisch", 1, 13)], "be"),
        ];
        let mut idle = create_helpee(4, "Englisch", 6, "be");
        idle.candidate.request_count = 0;
        let helpees = vec![
            create_helpee(2, "Mathematik", 5, "be"),
            create_helpee(3, "Deutsch", 5, "be"),
            create_helpee(5, "Englisch", 6, "be"),
            idle,
        ];

        let result = matcher.run(helpers, helpees);

        assert_eq!(result.assignments.len(), 1);
        assert_eq!(result.assignments[0].helper_id, 3);
        assert_eq!(result.assignments[0].helpee_id, 5);
        assert_eq!(result.stats.compatible_pairs, 1);
        assert_eq!(result.stats.excluded_pairs, 1);
        assert_eq!(result.stats.grade_mismatch_pairs, 1);
        assert_eq!(result.stats.unmatched_helpers.excluded, 1);
        assert_eq!(result.stats.unmatched_helpers.grade_mismatch, 1);
        assert_eq!(result.stats.unmatched_helpees.excluded, 1);
        assert_eq!(result.stats.unmatched_helpees.grade_mismatch, 1);
        assert_eq!(result.stats.unmatched_helpees.no_open_request, 1);
    }

    #[test]
    fn test_capacity_reported() {
        let matcher = Matcher::new(MatchingWeights::balanced());
        let helpers = vec![create_helper(1, vec![Subject::new("Mathematik", 1, 13)], "be")];
        let helpees = vec![
            create_helpee(1, "Mathematik", 7, "be"),
            create_helpee(2, "Mathematik", 7, "be"),
        ];

        let result = matcher.run(helpers, helpees);
        assert_eq!(result.assignments.len(), 1);
        assert_eq!(result.stats.unmatched_helpees.capacity, 1);
        assert_eq!(result.stats.unmatched_helpees.total(), 1);
    }

    #[test]
    fn test_edge_weight_ranks_pair_count_first() {
        let capacity = 4;
        let max_score = max_pair_score(&MatchingWeights::balanced());
        assert_eq!(max_score, 4.0);

        let best = edge_weight(max_score, max_score, capacity);
        let worst = edge_weight(0.0, max_score, capacity);
        assert_eq!(worst, 5.0);
        assert_eq!(best, 6.0);

        // Three top pairs never outweigh four zero-score pairs
        assert!(3.0 * best < 4.0 * worst);
    }

    #[test]
    fn test_edge_weight_is_scale_invariant() {
        let weights = MatchingWeights {
            state: 3.0,
            matching_priority: 1.0,
            ..MatchingWeights::default()
        };
        let scaled = MatchingWeights {
            state: 300.0,
            matching_priority: 100.0,
            ..MatchingWeights::default()
        };

        let a = edge_weight(3.0, max_pair_score(&weights), 2);
        let b = edge_weight(300.0, max_pair_score(&scaled), 2);
        assert!((a - b).abs() < 1e-12);
        assert_eq!(edge_weight(0.0, 0.0, 2), 3.0);
    }
}
