// snapshotrestore/src/restore/raw_insert.rs
use std::sync::Arc;

use crate::errors::Result;
use crate::restore::inserter::BatchOutcome;
use crate::restore::transform::{Record, RecordValue};
use crate::store::{JsonRows, StatementExecutor, json_insert_statement};

/// Row-at-a-time insertion for tables without a typed binding. The column set
/// comes from the first record of the file.
pub struct RawStatementInserter {
    executor: Arc<dyn StatementExecutor>,
    columns: Vec<String>,
    sql: String,
}

impl RawStatementInserter {
    pub fn prepare(
        executor: Arc<dyn StatementExecutor>,
        table: &str,
        first_record: &Record,
    ) -> Result<Self> {
        let columns: Vec<String> = first_record.keys().cloned().collect();
        // The whole row travels as one JSON parameter, so the table resolves column types.
        let sql = json_insert_statement(table, &columns, JsonRows::One, true)?;
        Ok(Self {
            executor,
            columns,
            sql,
        })
    }

    pub fn statement(&self) -> &str {
        &self.sql
    }

    pub async fn insert_batch(&self, records: &[Record]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for record in records {
            // A row with a different column set would bind the wrong shape.
            if !record.keys().eq(self.columns.iter()) {
                outcome.skipped += 1;
                continue;
            }
            let param = RecordValue::Map(record.clone());
            match self.executor.execute(&self.sql, std::slice::from_ref(&param)).await {
                Ok(affected) if affected > 0 => outcome.inserted += 1,
                // zero rows means the conflict clause swallowed it
                Ok(_) | Err(_) => outcome.skipped += 1,
            }
        }
        outcome
    }
}
