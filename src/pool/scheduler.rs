use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use crate::error::MatchingError;
use crate::models::{AutomaticRunReport, PoolOutcome, PoolRunReport};
use crate::pool::orchestrator::Orchestrator;
use crate::pool::registry::Pool;

/// Run every pool with an automatic trigger whose thresholds are met
///
/// Pools are processed one after another. A failing pool is reported and
/// does not stop the remaining pools.
pub async fn run_automatic_matching(orchestrator: &Orchestrator) -> AutomaticRunReport {
    tracing::info!("Started automatic matching");

    let mut report = AutomaticRunReport::default();

    for pool in orchestrator.registry().iter() {
        if pool.automatic().is_none() {
            continue;
        }

        let outcome = match run_pool(orchestrator, pool).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("MatchingPool({}) automatic run failed: {}", pool.name(), e);
                PoolOutcome::Failed { error: e.to_string() }
            }
        };

        report.pools.push(PoolRunReport {
            pool: pool.name().to_string(),
            outcome,
        });
    }

    tracing::info!(
        "Finished automatic matching ({} pools, {} failed)",
        report.pools.len(),
        report.failed()
    );

    report
}

async fn run_pool(orchestrator: &Orchestrator, pool: &Pool) -> Result<PoolOutcome, MatchingError> {
    let trigger = match pool.automatic() {
        Some(trigger) => *trigger,
        None => return Ok(PoolOutcome::Skipped { helpers: 0, helpees: 0 }),
    };

    let repository = orchestrator.repository();
    let (helpers, helpees) = tokio::try_join!(
        repository.count_helpers(&pool.definition.helpers),
        repository.count_helpees(&pool.definition.helpees),
    )?;

    if helpees < trigger.min_helpees || helpers < trigger.min_helpers {
        tracing::info!(
            "MatchingPool({}) is not matched as only {} helpers and {} helpees are waiting, {} and {} are required",
            pool.name(),
            helpers,
            helpees,
            trigger.min_helpers,
            trigger.min_helpees
        );
        return Ok(PoolOutcome::Skipped { helpers, helpees });
    }

    let result = orchestrator.run_matching(pool.name(), true).await?;
    let commit = result.commit.unwrap_or_default();

    Ok(PoolOutcome::Completed {
        matched: result.assignments.len(),
        committed: commit.created,
        failed: commit.failed.len(),
    })
}

/// Run the automatic gate on a fixed interval until the task is aborted
pub fn spawn_periodic(orchestrator: Arc<Orchestrator>, period: Duration, run_immediately: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately
        if !run_immediately {
            ticker.tick().await;
        }

        loop {
            ticker.tick().await;
            let report = run_automatic_matching(&orchestrator).await;
            tracing::debug!("Automatic matching report: {:?}", report);
        }
    })
}
