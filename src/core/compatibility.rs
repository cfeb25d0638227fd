use crate::models::{Helpee, Helper};

/// Outcome of checking a single helper/helpee pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PairCheck {
    /// No subject name in common
    NoSharedSubject,
    /// A subject is shared but the helpee's grade is outside every shared range
    GradeMismatch,
    /// Subjects fit, but one side excludes the other
    Excluded,
    Compatible,
}

/// Check whether a helper can tutor a helpee
///
/// Subjects are checked before exclusions so that an excluded pair is only
/// reported as such when it would otherwise have been compatible.
pub fn check_pair(helper: &Helper, helpee: &Helpee) -> PairCheck {
    let mut name_shared = false;
    let mut grade_fits = false;

    for offered in &helper.subjects {
        if !helpee
            .candidate
            .subjects
            .iter()
            .any(|wanted| same_subject(&offered.name, &wanted.name))
        {
            continue;
        }

        name_shared = true;
        // An unknown grade fits any range
        if helpee.grade.map_or(true, |grade| offered.grades.contains(grade)) {
            grade_fits = true;
            break;
        }
    }

    if !name_shared {
        return PairCheck::NoSharedSubject;
    }

    if !grade_fits {
        return PairCheck::GradeMismatch;
    }

    if helper.excludes(&helpee.candidate.external_ref) || helpee.candidate.excludes(&helper.external_ref) {
        return PairCheck::Excluded;
    }

    PairCheck::Compatible
}

#[inline]
pub fn is_compatible(helper: &Helper, helpee: &Helpee) -> bool {
    check_pair(helper, helpee) == PairCheck::Compatible
}

/// Subject names compare case-insensitively, ignoring surrounding whitespace
#[inline]
pub fn same_subject(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
