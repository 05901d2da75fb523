// snapshotrestore/src/restore/table_job.rs
use tracing::{debug, info, warn};

use crate::config::BatchSettings;
use crate::restore::inserter::{AdaptiveInserter, BatchOutcome};
use crate::restore::raw_insert::RawStatementInserter;
use crate::restore::snapshot::{Snapshot, read_table_file};
use crate::restore::stats::{RunStatistics, TableStatistics};
use crate::restore::transform::{Record, record_from_json, transform_record};
use crate::store::{BindingRegistry, TableBinding};

const PROGRESS_EVERY_BATCHES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Restored(TableStatistics),
    MissingFile,
    Unparseable,
}

/// Restores one table from its snapshot file.
pub struct TableRestoreJob<'a> {
    table: &'a str,
    snapshot: &'a Snapshot,
    registry: &'a BindingRegistry,
    batching: &'a BatchSettings,
    inserter: &'a AdaptiveInserter,
}

impl<'a> TableRestoreJob<'a> {
    pub fn new(
        table: &'a str,
        snapshot: &'a Snapshot,
        registry: &'a BindingRegistry,
        batching: &'a BatchSettings,
        inserter: &'a AdaptiveInserter,
    ) -> Self {
        Self {
            table,
            snapshot,
            registry,
            batching,
            inserter,
        }
    }

    pub async fn run(&self, stats: &mut RunStatistics) -> JobOutcome {
        let table = self.table;
        let path = self.snapshot.table_file(table);
        if !path.is_file() {
            warn!(table, "Backup file not found");
            stats.add_warning(format!("No backup file for table {}", table));
            return JobOutcome::MissingFile;
        }

        let rows = match read_table_file(path).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(table, error = %e, "Backup file could not be parsed");
                stats.add_warning(format!(
                    "Could not parse backup file for table {}: {}",
                    table, e
                ));
                return JobOutcome::Unparseable;
            }
        };

        let row_count = rows.len();
        let records: Vec<Record> = rows
            .into_iter()
            .filter_map(record_from_json)
            .map(|record| transform_record(&record))
            .collect();
        let malformed = (row_count - records.len()) as u64;
        if malformed > 0 {
            warn!(table, malformed, "Skipping rows that are not objects");
        }

        let mut outcome = match self.registry.binding(table) {
            Some(binding) => self.restore_bound(binding.as_ref(), &records).await,
            None => self.restore_raw(&records, stats).await,
        };
        outcome.skipped += malformed;

        let table_stats = TableStatistics {
            restored: outcome.inserted,
            skipped: outcome.skipped,
            errors: 0,
        };
        stats.record_table(table, table_stats);
        info!(
            table,
            attempted = outcome.total(),
            restored = table_stats.restored,
            skipped = table_stats.skipped,
            "Table restored"
        );
        JobOutcome::Restored(table_stats)
    }

    async fn restore_bound(&self, binding: &dyn TableBinding, records: &[Record]) -> BatchOutcome {
        let batch_size = self.batching.batch_size_for(self.table);
        let total_batches = records.len().div_ceil(batch_size);
        let mut totals = BatchOutcome::default();

        for (index, batch) in records.chunks(batch_size).enumerate() {
            totals += self
                .inserter
                .insert_batch(self.table, binding, batch, batch_size)
                .await;
            self.report_progress(index + 1, total_batches, totals);
            tokio::task::yield_now().await;
        }
        totals
    }

    async fn restore_raw(&self, records: &[Record], stats: &mut RunStatistics) -> BatchOutcome {
        let Some(first) = records.first() else {
            return BatchOutcome::default();
        };
        let inserter =
            match RawStatementInserter::prepare(self.registry.executor(), self.table, first) {
                Ok(inserter) => inserter,
                Err(e) => {
                    warn!(table = self.table, error = %e, "Cannot build insert statement");
                    stats.add_warning(format!(
                        "Skipped all rows of table {}: {}",
                        self.table, e
                    ));
                    return BatchOutcome {
                        inserted: 0,
                        skipped: records.len() as u64,
                    };
                }
            };
        debug!(table = self.table, sql = inserter.statement(), "Using raw insert statement");

        let batch_size = self.batching.batch_size_for(self.table);
        let total_batches = records.len().div_ceil(batch_size);
        let mut totals = BatchOutcome::default();
        for (index, batch) in records.chunks(batch_size).enumerate() {
            totals += inserter.insert_batch(batch).await;
            self.report_progress(index + 1, total_batches, totals);
            tokio::task::yield_now().await;
        }
        totals
    }

    fn report_progress(&self, done: usize, total_batches: usize, totals: BatchOutcome) {
        if done % PROGRESS_EVERY_BATCHES == 0 || done == total_batches {
            info!(
                table = self.table,
                batch = done,
                total_batches,
                inserted = totals.inserted,
                skipped = totals.skipped,
                "Restore progress"
            );
        }
    }
}
