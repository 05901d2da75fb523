// snapshotrestore/src/restore/cleanup.rs
use tracing::{debug, info};

use crate::store::BindingRegistry;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// Tables emptied successfully, with the number of rows removed.
    pub cleared: Vec<(String, u64)>,
}

impl CleanupReport {
    pub fn rows_deleted(&self) -> u64 {
        self.cleared.iter().map(|(_, count)| count).sum()
    }
}

/// Deletes every row from each bound table in `order` (children first).
/// Failures are expected for tables missing from the live schema and are ignored.
pub async fn run_cleanup(registry: &BindingRegistry, order: &[String]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for table in order {
        let Some(binding) = registry.binding(table) else {
            continue;
        };
        match binding.delete_all().await {
            Ok(count) => {
                if count > 0 {
                    info!(table = %table, rows = count, "Cleared table");
                }
                report.cleared.push((table.clone(), count));
            }
            Err(e) => debug!(table = %table, error = %e, "Cleanup skipped"),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AppError, Result};
    use crate::restore::transform::{Record, record_from_json};
    use crate::store::memory::MemoryStore;
    use crate::store::{BulkInsertOutcome, TableBinding};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct MissingTable;

    #[async_trait]
    impl TableBinding for MissingTable {
        async fn bulk_insert(&self, _records: &[Record]) -> Result<BulkInsertOutcome> {
            Err(AppError::Store("relation does not exist".to_string()))
        }

        async fn insert_one(&self, _record: &Record) -> Result<()> {
            Err(AppError::Store("relation does not exist".to_string()))
        }

        async fn delete_all(&self) -> Result<u64> {
            Err(AppError::Store("relation does not exist".to_string()))
        }
    }

    #[tokio::test]
    async fn test_clears_bound_tables_and_ignores_failures() {
        let store = MemoryStore::new();
        let row: Vec<_> = record_from_json(json!({"id": 1})).into_iter().collect();
        store.seed("users", row.clone());
        store.seed("posts", row.clone());
        store.seed("raw_links", row);
        let mut registry = store.registry(&["users", "posts"]);
        registry.register("ghost", Arc::new(MissingTable));

        let order: Vec<String> = ["posts", "ghost", "raw_links", "users"]
            .iter()
            .map(|t| t.to_string())
            .collect();
        let report = run_cleanup(&registry, &order).await;

        assert_eq!(
            report.cleared,
            vec![("posts".to_string(), 1), ("users".to_string(), 1)]
        );
        assert_eq!(report.rows_deleted(), 2);
        assert!(store.rows("users").is_empty());
        assert_eq!(store.rows("raw_links").len(), 1);
    }
}
