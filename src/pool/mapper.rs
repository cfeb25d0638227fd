use futures::{FutureExt, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use crate::models::domain::{DEFAULT_MAX_GRADE, DEFAULT_MIN_GRADE};
use crate::models::{Candidate, GradeRange, Helpee, Helper, RawHelpee, RawHelper, Side, Subject};
use crate::services::{CandidateRepository, RepositoryError};

/// Kind of malformed data that was replaced by a default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Subject list is not valid JSON; treated as empty
    MalformedSubjects,
    /// Grade restriction absent or invalid; the default range was used
    MissingGradeRestriction,
    /// Helpee grade unreadable; the helpee fits any grade range
    UnparsableGrade,
}

/// Non-fatal data quality issue found while mapping a candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualityWarning {
    pub side: Side,
    pub candidate_id: i64,
    pub kind: WarningKind,
}

/// Candidates of one side together with the warnings raised mapping them
#[derive(Debug, Clone)]
pub struct Mapped<T> {
    pub candidates: Vec<T>,
    pub warnings: Vec<DataQualityWarning>,
}

#[derive(Debug, Deserialize)]
struct StoredSubject {
    name: String,
    #[serde(default)]
    grade: Option<StoredGrade>,
}

#[derive(Debug, Deserialize)]
struct StoredGrade {
    #[serde(default)]
    min: Option<i64>,
    #[serde(default)]
    max: Option<i64>,
}

/// Subject as stored, with the grade restriction if one was readable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSubject {
    pub name: String,
    /// `None` when no bound was given or the given ones are invalid
    pub grades: Option<GradeRange>,
    /// False when one bound was missing and replaced by its default
    pub complete: bool,
}

/// Parse a stored subject list such as `[{"name":"Mathematik","grade":{"min":5,"max":9}}]`
pub fn parse_subjects(raw: &str) -> Result<Vec<ParsedSubject>, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let stored: Vec<StoredSubject> = serde_json::from_str(raw)?;

    Ok(stored
        .into_iter()
        .filter(|s| !s.name.trim().is_empty())
        .map(|s| {
            let complete = s.grade.as_ref().map_or(false, |g| g.min.is_some() && g.max.is_some());
            ParsedSubject {
                name: s.name.trim().to_string(),
                grades: s.grade.and_then(grade_range),
                complete,
            }
        })
        .collect())
}

/// Each missing bound falls back to its own default, so `{min: 5}` reads as 5..=13
fn grade_range(grade: StoredGrade) -> Option<GradeRange> {
    if grade.min.is_none() && grade.max.is_none() {
        return None;
    }

    let min = grade.min.unwrap_or(DEFAULT_MIN_GRADE as i64);
    let max = grade.max.unwrap_or(DEFAULT_MAX_GRADE as i64);

    let bounds = DEFAULT_MIN_GRADE as i64..=DEFAULT_MAX_GRADE as i64;
    if !bounds.contains(&min) || !bounds.contains(&max) || min > max {
        return None;
    }
    Some(GradeRange::new(min as u8, max as u8))
}

/// Read a grade such as `"7. Klasse"`, `"Klasse 11"` or `"3"`
pub fn parse_grade(raw: Option<&str>) -> Option<u8> {
    let digits: String = raw?
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    let grade: u8 = digits.parse().ok()?;
    (DEFAULT_MIN_GRADE..=DEFAULT_MAX_GRADE).contains(&grade).then_some(grade)
}

fn normalize_state(state: Option<&str>) -> Option<String> {
    state
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

/// Map a stored helper; missing grade restrictions fall back to the widest range
pub fn helper_from_record(raw: &RawHelper, history: Vec<String>) -> (Helper, Vec<WarningKind>) {
    let mut warnings = Vec::new();

    let subjects: Vec<Subject> = match parse_subjects(&raw.subjects) {
        Ok(parsed) => parsed
            .into_iter()
            .map(|s| {
                if !s.complete || s.grades.is_none() {
                    warnings.push(WarningKind::MissingGradeRestriction);
                }
                Subject {
                    name: s.name,
                    grades: s.grades.unwrap_or_default(),
                }
            })
            .collect(),
        Err(_) => {
            warnings.push(WarningKind::MalformedSubjects);
            Vec::new()
        }
    };

    let helper = Candidate {
        id: raw.id,
        external_ref: raw.external_ref.clone(),
        request_count: raw.open_match_request_count.max(0) as u32,
        subjects,
        created_at: raw.created_at,
        first_request_at: raw.first_match_request_at.unwrap_or(raw.created_at),
        exclude_refs: history.into_iter().collect(),
        state: normalize_state(raw.state.as_deref()),
    };

    (helper, warnings)
}

/// Map a stored helpee; its own subject ranges are not used for compatibility
pub fn helpee_from_record(raw: &RawHelpee, history: Vec<String>) -> (Helpee, Vec<WarningKind>) {
    let mut warnings = Vec::new();

    let subjects: Vec<Subject> = match parse_subjects(&raw.subjects) {
        Ok(parsed) => parsed
            .into_iter()
            .map(|s| Subject {
                name: s.name,
                grades: s.grades.unwrap_or_default(),
            })
            .collect(),
        Err(_) => {
            warnings.push(WarningKind::MalformedSubjects);
            Vec::new()
        }
    };

    let grade = parse_grade(raw.grade.as_deref());
    if grade.is_none() {
        warnings.push(WarningKind::UnparsableGrade);
    }

    let helpee = Helpee {
        candidate: Candidate {
            id: raw.id,
            external_ref: raw.external_ref.clone(),
            request_count: raw.open_match_request_count.max(0) as u32,
            subjects,
            created_at: raw.created_at,
            first_request_at: raw.first_match_request_at.unwrap_or(raw.created_at),
            exclude_refs: history.into_iter().collect(),
            state: normalize_state(raw.state.as_deref()),
        },
        priority: raw.matching_priority,
        grade,
    };

    (helpee, warnings)
}

fn collect<T>(side: Side, mapped: Vec<(i64, T, Vec<WarningKind>)>) -> Mapped<T> {
    let mut candidates = Vec::with_capacity(mapped.len());
    let mut warnings = Vec::new();

    for (candidate_id, candidate, kinds) in mapped {
        for kind in kinds {
            tracing::warn!("Defaulted malformed data for {} {}: {:?}", side, candidate_id, kind);
            warnings.push(DataQualityWarning { side, candidate_id, kind });
        }
        candidates.push(candidate);
    }

    Mapped { candidates, warnings }
}

/// Map stored helpers, looking up pairing histories concurrently
///
/// All lookups complete before this returns; any storage error fails the whole mapping.
pub async fn map_helpers(
    repository: &dyn CandidateRepository,
    raw: &[RawHelper],
    concurrency: usize,
) -> Result<Mapped<Helper>, RepositoryError> {
    let mapped: Vec<(i64, Helper, Vec<WarningKind>)> = futures::stream::iter(raw)
        .map(|record| async move {
            let history = repository.pairing_history(Side::Helper, record.id).await?;
            let (helper, warnings) = helper_from_record(record, history);
            Ok::<_, RepositoryError>((record.id, helper, warnings))
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .boxed()
        .await?;

    Ok(collect(Side::Helper, mapped))
}

/// Map stored helpees, looking up pairing histories concurrently
pub async fn map_helpees(
    repository: &dyn CandidateRepository,
    raw: &[RawHelpee],
    concurrency: usize,
) -> Result<Mapped<Helpee>, RepositoryError> {
    let mapped: Vec<(i64, Helpee, Vec<WarningKind>)> = futures::stream::iter(raw)
        .map(|record| async move {
            let history = repository.pairing_history(Side::Helpee, record.id).await?;
            let (helpee, warnings) = helpee_from_record(record, history);
            Ok::<_, RepositoryError>((record.id, helpee, warnings))
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .boxed()
        .await?;

    Ok(collect(Side::Helpee, mapped))
}
