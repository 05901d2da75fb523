// snapshotrestore/src/restore/inserter.rs
use async_trait::async_trait;
use std::ops::AddAssign;
use tracing::debug;

use crate::restore::transform::Record;
use crate::store::TableBinding;

/// Counts for one insertion attempt. `inserted + skipped` always equals the
/// number of records handed in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub inserted: u64,
    pub skipped: u64,
}

impl BatchOutcome {
    pub fn total(&self) -> u64 {
        self.inserted + self.skipped
    }
}

impl AddAssign for BatchOutcome {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.skipped += other.skipped;
    }
}

/// One step of the fallback cascade. `None` hands the batch to the next tier.
#[async_trait]
pub trait InsertTier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(
        &self,
        table: &str,
        binding: &dyn TableBinding,
        records: &[Record],
        batch_size: usize,
    ) -> Option<BatchOutcome>;
}

/// Whole batch in one skip-duplicates bulk call.
pub struct BulkTier;

/// Halves the batch size (not below the floor) and bulk-inserts chunk by chunk;
/// a chunk that still fails is inserted record by record.
pub struct ReducedBatchTier {
    pub floor: usize,
}

/// One record at a time. Failures are counted as skipped.
pub struct PerRecordTier;

async fn bulk_attempt(
    table: &str,
    binding: &dyn TableBinding,
    records: &[Record],
) -> Option<BatchOutcome> {
    match binding.bulk_insert(records).await {
        Ok(outcome) => {
            let attempted = records.len() as u64;
            // Without a reported count every attempted row is assumed written.
            let inserted = outcome.count.map_or(attempted, |count| count.min(attempted));
            Some(BatchOutcome {
                inserted,
                skipped: attempted - inserted,
            })
        }
        Err(e) => {
            debug!(table, size = records.len(), error = %e, "Bulk insert failed");
            None
        }
    }
}

async fn insert_each(binding: &dyn TableBinding, records: &[Record]) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for record in records {
        match binding.insert_one(record).await {
            Ok(()) => outcome.inserted += 1,
            Err(_) => outcome.skipped += 1,
        }
    }
    outcome
}

#[async_trait]
impl InsertTier for BulkTier {
    fn name(&self) -> &'static str {
        "bulk"
    }

    async fn attempt(
        &self,
        table: &str,
        binding: &dyn TableBinding,
        records: &[Record],
        _batch_size: usize,
    ) -> Option<BatchOutcome> {
        bulk_attempt(table, binding, records).await
    }
}

#[async_trait]
impl InsertTier for ReducedBatchTier {
    fn name(&self) -> &'static str {
        "reduced-batch"
    }

    async fn attempt(
        &self,
        table: &str,
        binding: &dyn TableBinding,
        records: &[Record],
        batch_size: usize,
    ) -> Option<BatchOutcome> {
        if batch_size <= self.floor {
            return None;
        }
        let reduced = (batch_size / 2).max(self.floor);
        debug!(table, from = batch_size, to = reduced, "Retrying with smaller batches");

        let mut outcome = BatchOutcome::default();
        for chunk in records.chunks(reduced) {
            match bulk_attempt(table, binding, chunk).await {
                Some(chunk_outcome) => outcome += chunk_outcome,
                None => outcome += insert_each(binding, chunk).await,
            }
        }
        Some(outcome)
    }
}

#[async_trait]
impl InsertTier for PerRecordTier {
    fn name(&self) -> &'static str {
        "per-record"
    }

    async fn attempt(
        &self,
        _table: &str,
        binding: &dyn TableBinding,
        records: &[Record],
        _batch_size: usize,
    ) -> Option<BatchOutcome> {
        Some(insert_each(binding, records).await)
    }
}

/// Inserts a batch through the bulk, reduced-batch and per-record tiers in
/// turn. Never fails: every record ends up inserted or skipped.
pub struct AdaptiveInserter {
    tiers: Vec<Box<dyn InsertTier>>,
}

impl AdaptiveInserter {
    pub fn new(min_batch_size: usize) -> Self {
        Self {
            tiers: vec![
                Box::new(BulkTier),
                Box::new(ReducedBatchTier {
                    floor: min_batch_size,
                }),
                Box::new(PerRecordTier),
            ],
        }
    }

    pub async fn insert_batch(
        &self,
        table: &str,
        binding: &dyn TableBinding,
        records: &[Record],
        batch_size: usize,
    ) -> BatchOutcome {
        for tier in &self.tiers {
            if let Some(outcome) = tier.attempt(table, binding, records, batch_size).await {
                debug!(
                    table,
                    tier = tier.name(),
                    inserted = outcome.inserted,
                    skipped = outcome.skipped,
                    "Batch settled"
                );
                return outcome;
            }
        }
        BatchOutcome {
            inserted: 0,
            skipped: records.len() as u64,
        }
    }
}
