use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::time::Duration;
use crate::models::records::TEST_ACCOUNT_MARKER;
use crate::models::{HelpeeFilter, HelperFilter, RawHelpee, RawHelper, Side};
use crate::services::repository::{CandidateRepository, CommitError, MatchCreator, RepositoryError};

const HELPER_COLUMNS: &str = r#"
    SELECT s.id, s.wix_id AS external_ref, s.email, s.active, s.verification,
           s.is_student, s.is_codu, sc.success AS screening_success,
           s.open_match_request_count, s.subjects, s.state,
           s.created_at, s.first_match_request_at
"#;

const HELPER_FROM: &str = r#"
    FROM student s
    LEFT JOIN screening sc ON sc.student_id = s.id
    WHERE TRUE
"#;

const HELPEE_COLUMNS: &str = r#"
    SELECT p.id, p.wix_id AS external_ref, p.email, p.active, p.verification,
           p.is_pupil, p.open_match_request_count, p.subjects, p.state, p.grade,
           p.matching_priority, p.registration_source,
           EXISTS (
               SELECT 1 FROM pupil_tutoring_interest_confirmation_request c
               WHERE c.pupil_id = p.id AND c.status = 'confirmed'
           ) AS tutoring_interest_confirmed,
           p.created_at, p.first_match_request_at
"#;

const HELPEE_FROM: &str = r#"
    FROM pupil p
    WHERE TRUE
"#;

/// PostgreSQL backed candidate storage and match creation
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    /// Connect and run migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, RepositoryError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, RepositoryError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

/// Global viability filter, applied to every pool
fn push_viability(qb: &mut QueryBuilder<'_, Postgres>, alias: &str) {
    qb.push(format!(" AND {alias}.active = TRUE AND {alias}.verification IS NULL AND {alias}.email NOT LIKE "));
    qb.push_bind(format!("%{}%", TEST_ACCOUNT_MARKER));
}

fn push_helper_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &HelperFilter) {
    qb.push(" AND s.is_student = ").push_bind(filter.is_student);
    qb.push(" AND s.open_match_request_count >= ").push_bind(filter.min_open_requests);

    if filter.require_subjects {
        qb.push(" AND s.subjects <> '[]' AND s.subjects <> ''");
    }

    if filter.require_successful_screening {
        qb.push(" AND sc.success = TRUE");
    }

    if let Some(is_codu) = filter.is_codu {
        qb.push(" AND s.is_codu = ").push_bind(is_codu);
    }

    if !filter.states.is_empty() {
        qb.push(" AND s.state = ANY(").push_bind(filter.states.clone()).push(")");
    }
}

fn push_helpee_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &HelpeeFilter) {
    qb.push(" AND p.is_pupil = ").push_bind(filter.is_pupil);
    qb.push(" AND p.open_match_request_count >= ").push_bind(filter.min_open_requests);

    if filter.require_subjects {
        qb.push(" AND p.subjects <> '[]' AND p.subjects <> ''");
    }

    if !filter.excluded_registration_sources.is_empty() {
        qb.push(" AND NOT (p.registration_source = ANY(")
            .push_bind(filter.excluded_registration_sources.clone())
            .push("))");
    }

    if filter.require_confirmed_interest {
        qb.push(
            " AND (EXISTS (SELECT 1 FROM pupil_tutoring_interest_confirmation_request c \
             WHERE c.pupil_id = p.id AND c.status = 'confirmed') OR p.registration_source = ANY(",
        )
        .push_bind(filter.confirmation_exempt_sources.clone())
        .push("))");
    }

    if !filter.states.is_empty() {
        qb.push(" AND p.state = ANY(").push_bind(filter.states.clone()).push(")");
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, order_by: &str, limit: Option<i64>, offset: Option<i64>) {
    qb.push(" ORDER BY ").push(order_by);
    if let Some(limit) = limit {
        qb.push(" LIMIT ").push_bind(limit);
    }
    if let Some(offset) = offset {
        qb.push(" OFFSET ").push_bind(offset);
    }
}

#[async_trait]
impl CandidateRepository for PgRepository {
    async fn fetch_helpers(
        &self,
        filter: &HelperFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<RawHelper>, RepositoryError> {
        let mut qb = QueryBuilder::new(HELPER_COLUMNS);
        qb.push(HELPER_FROM);
        push_viability(&mut qb, "s");
        push_helper_filter(&mut qb, filter);
        push_page(&mut qb, "s.id", limit, offset);

        let helpers = qb.build_query_as::<RawHelper>().fetch_all(&self.pool).await?;
        tracing::debug!("Fetched {} helpers", helpers.len());

        Ok(helpers)
    }

    async fn fetch_helpees(
        &self,
        filter: &HelpeeFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<RawHelpee>, RepositoryError> {
        let mut qb = QueryBuilder::new(HELPEE_COLUMNS);
        qb.push(HELPEE_FROM);
        push_viability(&mut qb, "p");
        push_helpee_filter(&mut qb, filter);
        push_page(&mut qb, "p.id", limit, offset);

        let helpees = qb.build_query_as::<RawHelpee>().fetch_all(&self.pool).await?;
        tracing::debug!("Fetched {} helpees", helpees.len());

        Ok(helpees)
    }

    async fn count_helpers(&self, filter: &HelperFilter) -> Result<u64, RepositoryError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) AS total");
        qb.push(HELPER_FROM);
        push_viability(&mut qb, "s");
        push_helper_filter(&mut qb, filter);

        let row = qb.build().fetch_one(&self.pool).await?;
        let total: i64 = row.get("total");
        Ok(total.max(0) as u64)
    }

    async fn count_helpees(&self, filter: &HelpeeFilter) -> Result<u64, RepositoryError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) AS total");
        qb.push(HELPEE_FROM);
        push_viability(&mut qb, "p");
        push_helpee_filter(&mut qb, filter);

        let row = qb.build().fetch_one(&self.pool).await?;
        let total: i64 = row.get("total");
        Ok(total.max(0) as u64)
    }

    async fn pairing_history(&self, side: Side, candidate_id: i64) -> Result<Vec<String>, RepositoryError> {
        let query = match side {
            Side::Helper => {
                r#"
                SELECT p.wix_id AS counterpart
                FROM "match" m
                JOIN pupil p ON p.id = m.pupil_id
                WHERE m.student_id = $1
                "#
            }
            Side::Helpee => {
                r#"
                SELECT s.wix_id AS counterpart
                FROM "match" m
                JOIN student s ON s.id = m.student_id
                WHERE m.pupil_id = $1
                "#
            }
        };

        let rows = sqlx::query(query).bind(candidate_id).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(|row| row.get("counterpart")).collect())
    }
}

#[async_trait]
impl MatchCreator for PgRepository {
    /// Insert the match and consume one open request on each side, atomically
    /// for this pairing only
    async fn create_match(&self, helpee: &RawHelpee, helper: &RawHelper) -> Result<(), CommitError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO "match" (uuid, student_id, pupil_id, source)
            VALUES ($1, $2, $3, 'matchedinternal')
            ON CONFLICT (student_id, pupil_id) DO NOTHING
            "#,
        )
        .bind(uuid::Uuid::new_v4())
        .bind(helper.id)
        .bind(helpee.id)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(CommitError::Duplicate {
                helper_ref: helper.external_ref.clone(),
                helpee_ref: helpee.external_ref.clone(),
            });
        }

        sqlx::query(
            "UPDATE student SET open_match_request_count = GREATEST(open_match_request_count - 1, 0) WHERE id = $1",
        )
        .bind(helper.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE pupil SET open_match_request_count = GREATEST(open_match_request_count - 1, 0) WHERE id = $1",
        )
        .bind(helpee.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!("Created match {} -> {}", helper.external_ref, helpee.external_ref);
        Ok(())
    }
}
