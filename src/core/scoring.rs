use chrono::{DateTime, Utc};
use crate::core::compatibility::same_subject;
use crate::models::{Helpee, Helper, MatchingWeights};

/// Credit for a wanted subject the helper offers, but not for the helpee's grade
const PARTIAL_SUBJECT_CREDIT: f64 = 0.5;

/// Batch-wide reference values the factors are normalized against
#[derive(Debug, Clone, Copy)]
pub struct BatchContext {
    /// Latest `first_request_at` in the batch, used as "now"
    pub newest_request: DateTime<Utc>,
    pub oldest_helper_request: DateTime<Utc>,
    pub oldest_helpee_request: DateTime<Utc>,
    pub max_priority: i32,
}

impl BatchContext {
    /// Derive reference values from the candidates alone, keeping scoring
    /// independent of the wall clock
    pub fn from_candidates(helpers: &[Helper], helpees: &[Helpee]) -> Option<Self> {
        let oldest_helper_request = helpers.iter().map(|h| h.first_request_at).min()?;
        let oldest_helpee_request = helpees.iter().map(|h| h.candidate.first_request_at).min()?;

        let newest_request = helpers
            .iter()
            .map(|h| h.first_request_at)
            .chain(helpees.iter().map(|h| h.candidate.first_request_at))
            .max()?;

        let max_priority = helpees.iter().map(|h| h.priority).max().unwrap_or(0);

        Some(Self {
            newest_request,
            oldest_helper_request,
            oldest_helpee_request,
            max_priority,
        })
    }
}

/// Individually normalized (0-1) factors of a pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreFactors {
    pub subject_matching: f64,
    pub state: f64,
    pub waiting_time: f64,
    pub matching_priority: f64,
}

impl ScoreFactors {
    /// Weighted sum of the factors
    pub fn weighted(&self, weights: &MatchingWeights) -> f64 {
        self.subject_matching * weights.subject_matching
            + self.state * weights.state
            + self.waiting_time * weights.waiting_time
            + self.matching_priority * weights.matching_priority
    }
}

/// Compute all factors for a compatible pair
pub fn score_factors(helper: &Helper, helpee: &Helpee, ctx: &BatchContext) -> ScoreFactors {
    let helper_wait = waiting_score(helper.first_request_at, ctx.oldest_helper_request, ctx.newest_request);
    let helpee_wait = waiting_score(
        helpee.candidate.first_request_at,
        ctx.oldest_helpee_request,
        ctx.newest_request,
    );

    ScoreFactors {
        subject_matching: subject_matching_score(helper, helpee),
        state: state_score(helper.state.as_deref(), helpee.candidate.state.as_deref()),
        waiting_time: (helper_wait + helpee_wait) / 2.0,
        matching_priority: priority_score(helpee.priority, ctx.max_priority),
    }
}

/// Calculate the pair score used as edge weight
pub fn calculate_pair_score(
    helper: &Helper,
    helpee: &Helpee,
    ctx: &BatchContext,
    weights: &MatchingWeights,
) -> f64 {
    score_factors(helper, helpee, ctx).weighted(weights)
}

/// Fraction of the helpee's subjects the helper covers (0-1)
///
/// A subject counts fully when the helpee's grade is inside the offered range
/// and half when only the name matches.
pub fn subject_matching_score(helper: &Helper, helpee: &Helpee) -> f64 {
    let wanted = &helpee.candidate.subjects;
    if wanted.is_empty() {
        return 0.0;
    }

    let covered: f64 = wanted
        .iter()
        .map(|subject| {
            let mut credit: f64 = 0.0;
            for offered in helper.subjects.iter().filter(|o| same_subject(&o.name, &subject.name)) {
                if helpee.grade.map_or(true, |g| offered.grades.contains(g)) {
                    return 1.0;
                }
                credit = PARTIAL_SUBJECT_CREDIT;
            }
            credit
        })
        .sum();

    covered / wanted.len() as f64
}

/// 1 when both sides are in the same state, 0 otherwise or when unknown
#[inline]
pub fn state_score(helper_state: Option<&str>, helpee_state: Option<&str>) -> f64 {
    match (helper_state, helpee_state) {
        (Some(a), Some(b)) if !a.is_empty() && !is_unspecified_state(a) && a.eq_ignore_ascii_case(b) => 1.0,
        _ => 0.0,
    }
}

#[inline]
fn is_unspecified_state(state: &str) -> bool {
    state.eq_ignore_ascii_case("other")
}

/// Waiting time relative to the longest waiting candidate of the same side (0-1)
#[inline]
pub fn waiting_score(
    first_request_at: DateTime<Utc>,
    oldest: DateTime<Utc>,
    newest: DateTime<Utc>,
) -> f64 {
    let longest = (newest - oldest).num_seconds();
    if longest <= 0 {
        return 0.0;
    }

    let waited = (newest - first_request_at).num_seconds().max(0);
    (waited as f64 / longest as f64).min(1.0)
}

/// Priority relative to the highest priority in the batch (0-1)
#[inline]
pub fn priority_score(priority: i32, max_priority: i32) -> f64 {
    if max_priority <= 0 || priority <= 0 {
        return 0.0;
    }

    (priority as f64 / max_priority as f64).min(1.0)
}
