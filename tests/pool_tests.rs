// Integration tests for pool runs, the commit phase and the automatic gate

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use match_pool::error::MatchingError;
use match_pool::models::{
    HelpeeFilter, HelperFilter, MatchingWeights, PoolOutcome, RawHelpee, RawHelper, Side,
};
use match_pool::pool::{run_automatic_matching, AutomaticTrigger, Orchestrator, PoolDefinition, PoolRegistry};
use match_pool::services::{CandidateRepository, CommitError, InMemoryRepository, MatchCreator, RepositoryError};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn create_raw_helper(id: i64, subjects: &str) -> RawHelper {
    let at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap() + Duration::days(id);
    RawHelper {
        id,
        external_ref: format!("student-{}", id),
        email: format!("student{}@example.org", id),
        active: true,
        verification: None,
        is_student: true,
        is_codu: false,
        screening_success: Some(true),
        open_match_request_count: 2,
        subjects: subjects.to_string(),
        state: Some("be".to_string()),
        created_at: at,
        first_match_request_at: Some(at),
    }
}

fn create_raw_helpee(id: i64, subjects: &str, grade: &str) -> RawHelpee {
    let at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap() + Duration::days(id);
    RawHelpee {
        id,
        external_ref: format!("pupil-{}", id),
        email: format!("pupil{}@example.org", id),
        active: true,
        verification: None,
        is_pupil: true,
        open_match_request_count: 2,
        subjects: subjects.to_string(),
        state: Some("be".to_string()),
        grade: Some(grade.to_string()),
        matching_priority: 0,
        registration_source: "normal".to_string(),
        tutoring_interest_confirmed: true,
        created_at: at,
        first_match_request_at: Some(at),
    }
}

const MATH: &str = r#"[{"name":"Mathematik","grade":{"min":5,"max":10}}]"#;
const GERMAN: &str = r#"[{"name":"Deutsch","grade":{"min":1,"max":13}}]"#;

fn definition(name: &str, automatic: Option<AutomaticTrigger>) -> PoolDefinition {
    PoolDefinition {
        name: name.to_string(),
        helpers: HelperFilter::default(),
        helpees: HelpeeFilter::default(),
        weights: MatchingWeights::balanced(),
        automatic,
    }
}

fn seeded_repository() -> Arc<InMemoryRepository> {
    Arc::new(InMemoryRepository::new(
        vec![
            create_raw_helper(1, MATH),
            create_raw_helper(2, GERMAN),
            create_raw_helper(3, MATH),
        ],
        vec![
            create_raw_helpee(11, MATH, "7. Klasse"),
            create_raw_helpee(12, GERMAN, "3"),
            create_raw_helpee(13, MATH, "12. Klasse"),
        ],
    ))
}

fn orchestrator(repository: Arc<InMemoryRepository>, definitions: Vec<PoolDefinition>) -> Orchestrator {
    let registry = PoolRegistry::from_definitions(definitions, repository.clone()).unwrap();
    Orchestrator::new(Arc::new(registry), repository)
}

#[tokio::test]
async fn test_integration_dry_run_is_idempotent() {
    let repository = seeded_repository();
    let orchestrator = orchestrator(repository.clone(), vec![definition("default", None)]);

    let first = assert_ok!(orchestrator.run_matching("default", false).await);
    let second = assert_ok!(orchestrator.run_matching("default", false).await);

    assert!(!first.applied);
    assert!(first.commit.is_none());
    assert_eq!(first.assignments, second.assignments);
    assert_eq!(first.stats, second.stats);

    // Pupil 13 is in grade 12, outside every math range
    assert_eq!(first.assignments.len(), 2);
    assert_eq!(first.stats.unmatched_helpees.grade_mismatch, 1);
    assert!(repository.matches().unwrap().is_empty());
}

#[tokio::test]
async fn test_integration_apply_commits_and_blocks_rematch() {
    let repository = seeded_repository();
    let orchestrator = orchestrator(repository.clone(), vec![definition("default", None)]);

    let applied = assert_ok!(orchestrator.run_matching("default", true).await);
    let commit = applied.commit.expect("commit report");
    assert_eq!(commit.created, applied.assignments.len());
    assert!(commit.is_complete());
    assert_eq!(repository.matches().unwrap().len(), 2);

    // Open requests remain, but nobody is paired with a former partner again
    let rerun = assert_ok!(orchestrator.run_matching("default", false).await);
    for assignment in &rerun.assignments {
        assert!(!applied
            .assignments
            .iter()
            .any(|a| a.helper_id == assignment.helper_id && a.helpee_id == assignment.helpee_id));
    }
    assert!(rerun.stats.excluded_pairs >= 2);
}

#[tokio::test]
async fn test_integration_dissolved_pairing_still_excluded() {
    let repository = Arc::new(InMemoryRepository::new(
        vec![create_raw_helper(1, GERMAN)],
        vec![create_raw_helpee(11, GERMAN, "5")],
    ));
    assert_ok!(repository.insert_match(1, 11, true));
    let orchestrator = orchestrator(repository, vec![definition("default", None)]);

    let result = assert_ok!(orchestrator.run_matching("default", false).await);
    assert!(result.assignments.is_empty());
    assert_eq!(result.stats.excluded_pairs, 1);
}

#[tokio::test]
async fn test_integration_viability_and_filters() {
    let mut test_account = create_raw_helper(4, MATH);
    test_account.email = "test@lern-fair.de".to_string();
    let mut inactive = create_raw_helpee(14, MATH, "7");
    inactive.active = false;
    let mut codu = create_raw_helpee(15, MATH, "7");
    codu.registration_source = "codu".to_string();

    let repository = Arc::new(InMemoryRepository::new(
        vec![create_raw_helper(1, MATH), test_account],
        vec![create_raw_helpee(11, MATH, "7"), inactive, codu],
    ));

    let mut pool = definition("filtered", None);
    pool.helpees.excluded_registration_sources = vec!["codu".to_string()];
    let orchestrator = orchestrator(repository, vec![pool]);

    let result = assert_ok!(orchestrator.run_matching("filtered", false).await);
    assert_eq!(result.stats.helper_count, 1);
    assert_eq!(result.stats.helpee_count, 1);

    let summaries = assert_ok!(orchestrator.pool_summaries().await);
    assert_eq!(summaries[0].eligible_helpers, 1);
    assert_eq!(summaries[0].eligible_helpees, 1);
}

#[tokio::test]
async fn test_integration_malformed_data_is_counted() {
    let repository = Arc::new(InMemoryRepository::new(
        vec![create_raw_helper(1, r#"[{"name":"Deutsch"}]"#)],
        vec![create_raw_helpee(11, GERMAN, "Vorschule")],
    ));
    let orchestrator = orchestrator(repository, vec![definition("default", None)]);

    let result = assert_ok!(orchestrator.run_matching("default", false).await);
    // Defaulted range plus a grade that fits any range
    assert_eq!(result.data_quality_warnings, 2);
    assert_eq!(result.assignments.len(), 1);
}

#[tokio::test]
async fn test_integration_unknown_pool() {
    let orchestrator = orchestrator(seeded_repository(), vec![definition("default", None)]);

    let err = assert_err!(orchestrator.run_matching("missing", false).await);
    assert!(matches!(err, MatchingError::PoolNotFound(ref name) if name == "missing"));
    assert!(err.is_configuration());
}

#[tokio::test]
async fn test_integration_gate_skips_below_threshold() {
    let repository = Arc::new(InMemoryRepository::new(
        (1..=4).map(|id| create_raw_helper(id, GERMAN)).collect(),
        (11..=16).map(|id| create_raw_helpee(id, GERMAN, "4")).collect(),
    ));
    let trigger = AutomaticTrigger {
        min_helpers: 5,
        min_helpees: 5,
    };
    let orchestrator = orchestrator(repository.clone(), vec![definition("gated", Some(trigger))]);

    let report = run_automatic_matching(&orchestrator).await;

    assert_eq!(report.pools.len(), 1);
    assert!(matches!(
        report.pools[0].outcome,
        PoolOutcome::Skipped { helpers: 4, helpees: 6 }
    ));
    assert!(repository.matches().unwrap().is_empty());
}

#[tokio::test]
async fn test_integration_gate_runs_and_ignores_manual_pools() {
    let repository = seeded_repository();
    let trigger = AutomaticTrigger {
        min_helpers: 1,
        min_helpees: 1,
    };
    let orchestrator = orchestrator(
        repository.clone(),
        vec![definition("manual", None), definition("auto", Some(trigger))],
    );

    let report = run_automatic_matching(&orchestrator).await;

    assert_eq!(report.pools.len(), 1);
    assert_eq!(report.pools[0].pool, "auto");
    assert!(matches!(
        report.pools[0].outcome,
        PoolOutcome::Completed { matched: 2, committed: 2, failed: 0 }
    ));
    assert_eq!(repository.matches().unwrap().len(), 2);
}

/// Storage that fails every read for helper filters restricted to `broken`
struct FlakyRepository {
    inner: Arc<InMemoryRepository>,
}

impl FlakyRepository {
    fn check(states: &[String]) -> Result<(), RepositoryError> {
        if states.iter().any(|s| s == "broken") {
            return Err(RepositoryError::Backend("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CandidateRepository for FlakyRepository {
    async fn fetch_helpers(
        &self,
        filter: &HelperFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<RawHelper>, RepositoryError> {
        Self::check(&filter.states)?;
        self.inner.fetch_helpers(filter, limit, offset).await
    }

    async fn fetch_helpees(
        &self,
        filter: &HelpeeFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<RawHelpee>, RepositoryError> {
        self.inner.fetch_helpees(filter, limit, offset).await
    }

    async fn count_helpers(&self, filter: &HelperFilter) -> Result<u64, RepositoryError> {
        Self::check(&filter.states)?;
        self.inner.count_helpers(filter).await
    }

    async fn count_helpees(&self, filter: &HelpeeFilter) -> Result<u64, RepositoryError> {
        self.inner.count_helpees(filter).await
    }

    async fn pairing_history(&self, side: Side, candidate_id: i64) -> Result<Vec<String>, RepositoryError> {
        self.inner.pairing_history(side, candidate_id).await
    }
}

#[tokio::test]
async fn test_integration_gate_isolates_failing_pool() {
    let inner = seeded_repository();
    let trigger = Some(AutomaticTrigger {
        min_helpers: 1,
        min_helpees: 1,
    });

    let mut broken = definition("broken", trigger);
    broken.helpers.states = vec!["broken".to_string()];

    let registry = PoolRegistry::from_definitions(
        vec![broken, definition("healthy", trigger)],
        inner.clone(),
    )
    .unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(registry),
        Arc::new(FlakyRepository { inner: inner.clone() }),
    );

    let report = run_automatic_matching(&orchestrator).await;

    assert_eq!(report.pools.len(), 2);
    assert_eq!(report.failed(), 1);
    assert!(matches!(report.pools[0].outcome, PoolOutcome::Failed { .. }));
    assert!(matches!(report.pools[1].outcome, PoolOutcome::Completed { committed: 2, .. }));

    let err = assert_err!(orchestrator.run_matching("broken", false).await);
    assert!(matches!(err, MatchingError::Storage(_)));
}

/// Creation callback rejecting one helpee and delegating the rest
struct RejectingCreator {
    inner: Arc<InMemoryRepository>,
    rejected_helpee: i64,
}

#[async_trait]
impl MatchCreator for RejectingCreator {
    async fn create_match(&self, helpee: &RawHelpee, helper: &RawHelper) -> Result<(), CommitError> {
        if helpee.id == self.rejected_helpee {
            return Err(CommitError::Rejected(format!("{} is on hold", helpee.external_ref)));
        }
        self.inner.create_match(helpee, helper).await
    }
}

#[tokio::test]
async fn test_integration_commit_continues_past_failure() {
    let repository = seeded_repository();
    let mut registry = PoolRegistry::default();
    assert_ok!(registry.register(
        definition("partial", None),
        Arc::new(RejectingCreator {
            inner: repository.clone(),
            rejected_helpee: 11,
        }),
    ));
    let orchestrator = Orchestrator::new(Arc::new(registry), repository.clone());

    let result = assert_ok!(orchestrator.run_matching("partial", true).await);
    let commit = result.commit.expect("commit report");

    assert_eq!(result.assignments.len(), 2);
    assert_eq!(commit.created, 1);
    assert_eq!(commit.failed.len(), 1);
    assert_eq!(commit.failed[0].helpee_ref, "pupil-11");

    let matches = repository.matches().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].helpee_id, 12);
}

#[tokio::test]
async fn test_integration_duplicate_pairing_rejected_by_storage() {
    let repository = seeded_repository();
    let helper = create_raw_helper(2, GERMAN);
    let helpee = create_raw_helpee(12, GERMAN, "3");

    assert_ok!(repository.create_match(&helpee, &helper).await);
    let err = assert_err!(repository.create_match(&helpee, &helper).await);
    assert!(matches!(err, CommitError::Duplicate { .. }));
}
