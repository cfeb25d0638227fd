use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use crate::core::Matcher;
use crate::error::MatchingError;
use crate::models::{PhaseTiming, PoolSummary, RawHelpee, RawHelper, RunResult};
use crate::pool::commit::commit_assignments;
use crate::pool::mapper::{map_helpees, map_helpers};
use crate::pool::registry::PoolRegistry;
use crate::services::CandidateRepository;

/// Default number of pairing-history lookups in flight per side
pub const DEFAULT_HISTORY_CONCURRENCY: usize = 16;

/// Drives allocation runs: fetch, map, match and optionally commit
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<PoolRegistry>,
    repository: Arc<dyn CandidateRepository>,
    history_concurrency: usize,
}

impl Orchestrator {
    pub fn new(registry: Arc<PoolRegistry>, repository: Arc<dyn CandidateRepository>) -> Self {
        Self {
            registry,
            repository,
            history_concurrency: DEFAULT_HISTORY_CONCURRENCY,
        }
    }

    pub fn with_history_concurrency(mut self, concurrency: usize) -> Self {
        self.history_concurrency = concurrency.max(1);
        self
    }

    pub fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    pub fn repository(&self) -> &dyn CandidateRepository {
        self.repository.as_ref()
    }

    /// Run one pool; with `apply` the computed pairings are committed
    ///
    /// Storage errors before the commit phase abort the run without side effects.
    pub async fn run_matching(&self, pool_name: &str, apply: bool) -> Result<RunResult, MatchingError> {
        let pool = self.registry.get(pool_name)?;
        let repository = self.repository.as_ref();

        tracing::info!("MatchingPool({}) started matching (apply: {})", pool.name(), apply);

        let mut timing = PhaseTiming::default();

        let start = Instant::now();
        let (raw_helpers, raw_helpees) = tokio::try_join!(
            repository.fetch_helpers(&pool.definition.helpers, None, None),
            repository.fetch_helpees(&pool.definition.helpees, None, None),
        )?;

        let (helpers, helpees) = tokio::try_join!(
            map_helpers(repository, &raw_helpers, self.history_concurrency),
            map_helpees(repository, &raw_helpees, self.history_concurrency),
        )?;
        timing.preparation = elapsed_ms(start);

        let data_quality_warnings = helpers.warnings.len() + helpees.warnings.len();
        tracing::info!(
            "MatchingPool({}) found {} helpees and {} helpers for matching in {}ms ({} data quality warnings)",
            pool.name(),
            raw_helpees.len(),
            raw_helpers.len(),
            timing.preparation,
            data_quality_warnings
        );

        let start = Instant::now();
        let result = Matcher::new(*pool.weights()).run(helpers.candidates, helpees.candidates);
        timing.matching = elapsed_ms(start);

        tracing::info!(
            "MatchingPool({}) calculated {} matches in {}ms (average score {:.3})",
            pool.name(),
            result.assignments.len(),
            timing.matching,
            result.stats.average_score
        );

        let commit = if apply {
            let helpers_by_id: HashMap<i64, &RawHelper> = raw_helpers.iter().map(|h| (h.id, h)).collect();
            let helpees_by_id: HashMap<i64, &RawHelpee> = raw_helpees.iter().map(|h| (h.id, h)).collect();

            let start = Instant::now();
            let report = commit_assignments(
                pool.name(),
                pool.creator.as_ref(),
                &result.assignments,
                &helpers_by_id,
                &helpees_by_id,
            )
            .await;
            timing.commit = elapsed_ms(start);

            tracing::info!(
                "MatchingPool({}) created {} matches in {}ms ({} failed)",
                pool.name(),
                report.created,
                timing.commit,
                report.failed.len()
            );
            Some(report)
        } else {
            None
        };

        Ok(RunResult {
            pool: pool.name().to_string(),
            applied: apply,
            timing,
            stats: result.stats,
            data_quality_warnings,
            assignments: result.assignments,
            commit,
        })
    }

    /// Registered pools with their current eligible population sizes
    pub async fn pool_summaries(&self) -> Result<Vec<PoolSummary>, MatchingError> {
        let mut summaries = Vec::with_capacity(self.registry.len());

        for pool in self.registry.iter() {
            let (eligible_helpers, eligible_helpees) = tokio::try_join!(
                self.repository.count_helpers(&pool.definition.helpers),
                self.repository.count_helpees(&pool.definition.helpees),
            )?;

            summaries.push(PoolSummary {
                name: pool.name().to_string(),
                weights: *pool.weights(),
                min_helpers: pool.automatic().map(|a| a.min_helpers),
                min_helpees: pool.automatic().map(|a| a.min_helpees),
                eligible_helpers,
                eligible_helpees,
            });
        }

        Ok(summaries)
    }
}

#[inline]
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
