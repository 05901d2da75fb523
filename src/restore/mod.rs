pub(crate) mod cleanup;
pub(crate) mod inserter;
mod logic;
pub(crate) mod planner;
pub(crate) mod raw_insert;
pub(crate) mod snapshot;
pub(crate) mod stats;
pub(crate) mod table_job;
pub(crate) mod transform;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::config::RestoreConfig;
use crate::restore::stats::RunStatistics;
use crate::store::postgres;
use crate::utils::sequence_reset::reset_sequences_with_timeout;

/// Public entry point for the restore process. The summary is printed whether
/// or not the run succeeds; a fatal error is recorded in it and returned.
pub async fn run_restore_flow(restore_config: &RestoreConfig) -> Result<RunStatistics> {
    let mut stats = RunStatistics::new(Utc::now());
    let outcome = perform_restore_orchestration(restore_config, &mut stats).await;
    println!("{}", settle_run(&mut stats, &outcome, Utc::now()));
    outcome.map(|_| stats)
}

/// Records a fatal outcome in the statistics and renders the final report.
fn settle_run(
    stats: &mut RunStatistics,
    outcome: &Result<()>,
    finished_at: DateTime<Utc>,
) -> String {
    if let Err(e) = outcome {
        stats.add_error(format!("{:#}", e));
    }
    stats.render(finished_at)
}

async fn perform_restore_orchestration(
    restore_config: &RestoreConfig,
    stats: &mut RunStatistics,
) -> Result<()> {
    let pool = postgres::connect(&restore_config.target_db_url)
        .await
        .context("Failed to connect to the target database")?;
    let registry = postgres::introspect_registry(&pool)
        .await
        .context("Failed to introspect the target schema")?;

    logic::Restorer::new(restore_config, &registry)
        .perform_restore(stats)
        .await?;

    if restore_config.reset_sequences {
        match reset_sequences_with_timeout(&pool).await {
            Ok(warnings) => warnings.into_iter().for_each(|w| stats.add_warning(w)),
            Err(e) => stats.add_warning(format!("Sequence reset failed: {:#}", e)),
        }
    }
    Ok(())
}
