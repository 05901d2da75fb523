// snapshotrestore/src/restore/logic.rs
use anyhow::{Context, Result};
use tracing::info;

use crate::config::RestoreConfig;
use crate::errors::AppError;
use crate::restore::cleanup::run_cleanup;
use crate::restore::inserter::AdaptiveInserter;
use crate::restore::planner::{cleanup_order, missing_priority_tables, plan_restore_order};
use crate::restore::snapshot::{Snapshot, locate_latest_snapshot};
use crate::restore::stats::RunStatistics;
use crate::restore::table_job::TableRestoreJob;
use crate::store::BindingRegistry;

/// Drives one restore run: snapshot, cleanup, plan, then every table in order.
pub struct Restorer<'a> {
    config: &'a RestoreConfig,
    registry: &'a BindingRegistry,
}

impl<'a> Restorer<'a> {
    pub fn new(config: &'a RestoreConfig, registry: &'a BindingRegistry) -> Self {
        Self { config, registry }
    }

    pub async fn perform_restore(&self, stats: &mut RunStatistics) -> Result<()> {
        self.registry
            .executor()
            .ping()
            .await
            .context("Target database is not reachable")?;

        let snapshot_dir = locate_latest_snapshot(&self.config.backup_root)
            .ok_or_else(|| AppError::NoSnapshot(self.config.backup_root.clone()))?;
        let snapshot = Snapshot::new(snapshot_dir);
        println!("📦 Using snapshot: {}", snapshot.name());
        self.restore_snapshot(&snapshot, stats).await
    }

    /// Lists the snapshot, clears the target, then restores every table in plan order.
    /// The listing happens first; the target is untouched if it fails.
    async fn restore_snapshot(&self, snapshot: &Snapshot, stats: &mut RunStatistics) -> Result<()> {
        let present = snapshot.table_names().with_context(|| {
            format!("Failed to list table files in snapshot {}", snapshot.name())
        })?;
        for table in missing_priority_tables(&self.config.table_priority, &present) {
            stats.add_warning(format!("No backup file for table {}", table));
        }
        let plan = plan_restore_order(&self.config.table_priority, &present);

        if self.config.skip_cleanup {
            println!("⏭  Skipping cleanup of existing rows as configured.");
        } else {
            println!("🧹 Removing existing rows (children first)...");
            let order = cleanup_order(&self.config.table_priority);
            let report = run_cleanup(self.registry, &order).await;
            println!(
                "✓ Cleanup finished: {} tables cleared, {} rows deleted",
                report.cleared.len(),
                report.rows_deleted()
            );
        }

        info!(tables = plan.len(), "Restore plan ready");
        let inserter = AdaptiveInserter::new(self.config.batching.min_batch_size);
        for (index, table) in plan.iter().enumerate() {
            println!("[{}/{}] Restoring table: {}", index + 1, plan.len(), table);
            TableRestoreJob::new(
                table,
                snapshot,
                self.registry,
                &self.config.batching,
                &inserter,
            )
            .run(stats)
            .await;
        }
        Ok(())
    }
}
