use std::collections::HashMap;
use crate::models::{Assignment, CommitFailure, CommitReport, RawHelpee, RawHelper};
use crate::services::MatchCreator;

/// Persist assignments one at a time, in engine order
///
/// Not transactional across assignments: a failed pairing is reported and the
/// remaining ones are still attempted. Earlier commits are never rolled back.
pub async fn commit_assignments(
    pool_name: &str,
    creator: &dyn MatchCreator,
    assignments: &[Assignment],
    helpers: &HashMap<i64, &RawHelper>,
    helpees: &HashMap<i64, &RawHelpee>,
) -> CommitReport {
    let mut report = CommitReport::default();

    for assignment in assignments {
        let (helper, helpee) = match (helpers.get(&assignment.helper_id), helpees.get(&assignment.helpee_id)) {
            (Some(helper), Some(helpee)) => (*helper, *helpee),
            _ => {
                report.failed.push(failure(assignment, "record missing from fetched candidates".to_string()));
                continue;
            }
        };

        match creator.create_match(helpee, helper).await {
            Ok(()) => report.created += 1,
            Err(e) => {
                tracing::warn!(
                    "MatchingPool({}) failed to create match {} -> {}: {}",
                    pool_name,
                    assignment.helper_ref,
                    assignment.helpee_ref,
                    e
                );
                report.failed.push(failure(assignment, e.to_string()));
            }
        }
    }

    report
}

fn failure(assignment: &Assignment, error: String) -> CommitFailure {
    CommitFailure {
        helper_ref: assignment.helper_ref.clone(),
        helpee_ref: assignment.helpee_ref.clone(),
        error,
    }
}
