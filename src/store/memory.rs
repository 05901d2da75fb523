// snapshotrestore/src/store/memory.rs
//! In-memory store used by the tests. Rows are unique on their `id` field.

use async_trait::async_trait;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::{BindingRegistry, BulkInsertOutcome, StatementExecutor, TableBinding};
use crate::errors::{AppError, Result};
use crate::restore::transform::{Record, RecordValue};

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Record>>>,
    insert_log: Mutex<Vec<String>>,
    statements: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a bound table for each name, sharing this store as the raw executor.
    pub fn registry(self: &Arc<Self>, bound_tables: &[&str]) -> BindingRegistry {
        let mut registry = BindingRegistry::new(Arc::clone(self) as Arc<dyn StatementExecutor>);
        for table in bound_tables {
            registry.register(*table, Arc::new(self.table(table)));
        }
        registry
    }

    pub fn table(self: &Arc<Self>, name: &str) -> MemoryTable {
        MemoryTable {
            store: Arc::clone(self),
            name: name.to_string(),
            reports_count: true,
        }
    }

    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.tables.lock().unwrap().get(table).cloned().unwrap_or_default()
    }

    pub fn seed(&self, table: &str, rows: Vec<Record>) {
        self.tables.lock().unwrap().entry(table.to_string()).or_default().extend(rows);
    }

    /// Table names in the order their first row was written.
    pub fn insert_order(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for table in self.insert_log.lock().unwrap().iter() {
            if !seen.contains(table) {
                seen.push(table.clone());
            }
        }
        seen
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    fn insert(&self, table: &str, record: &Record) -> bool {
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        if let Some(id) = record.get("id") {
            if rows.iter().any(|row| row.get("id") == Some(id)) {
                return false;
            }
        }
        rows.push(record.clone());
        self.insert_log.lock().unwrap().push(table.to_string());
        true
    }

    fn has_conflict(&self, table: &str, record: &Record) -> bool {
        let tables = self.tables.lock().unwrap();
        match (tables.get(table), record.get("id")) {
            (Some(rows), Some(id)) => rows.iter().any(|row| row.get("id") == Some(id)),
            _ => false,
        }
    }
}

pub struct MemoryTable {
    store: Arc<MemoryStore>,
    name: String,
    reports_count: bool,
}

impl MemoryTable {
    pub fn without_counts(mut self) -> Self {
        self.reports_count = false;
        self
    }
}

#[async_trait]
impl TableBinding for MemoryTable {
    async fn bulk_insert(&self, records: &[Record]) -> Result<BulkInsertOutcome> {
        let inserted = records
            .iter()
            .filter(|record| self.store.insert(&self.name, record))
            .count() as u64;
        Ok(BulkInsertOutcome {
            count: self.reports_count.then_some(inserted),
        })
    }

    async fn insert_one(&self, record: &Record) -> Result<()> {
        if self.store.has_conflict(&self.name, record) {
            return Err(AppError::Store(format!("unique constraint failed on {}", self.name)));
        }
        self.store.insert(&self.name, record);
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut tables = self.store.tables.lock().unwrap();
        Ok(tables.remove(&self.name).map_or(0, |rows| rows.len() as u64))
    }
}

#[async_trait]
impl StatementExecutor for MemoryStore {
    async fn execute(&self, sql: &str, params: &[RecordValue]) -> Result<u64> {
        self.statements.lock().unwrap().push(sql.to_string());
        let pattern = Regex::new(r#"^INSERT INTO "([^"]+)""#).unwrap();
        let Some(table) = pattern.captures(sql).map(|c| c[1].to_string()) else {
            return Ok(0);
        };
        match params.first() {
            Some(RecordValue::Map(row)) => Ok(u64::from(self.insert(&table, row))),
            _ => Err(AppError::Store("expected a row parameter".to_string())),
        }
    }
}

/// Binding that fails bulk inserts above a size limit or containing a poisoned id,
/// and fails single inserts of poisoned ids. Everything else goes to a `MemoryTable`.
pub struct ScriptedBinding {
    inner: MemoryTable,
    max_bulk: usize,
    poisoned: HashSet<i64>,
    bulk_calls: Mutex<Vec<usize>>,
}

impl ScriptedBinding {
    pub fn new(inner: MemoryTable, max_bulk: usize, poisoned: &[i64]) -> Self {
        Self {
            inner,
            max_bulk,
            poisoned: poisoned.iter().copied().collect(),
            bulk_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn bulk_calls(&self) -> Vec<usize> {
        self.bulk_calls.lock().unwrap().clone()
    }

    fn is_poisoned(&self, record: &Record) -> bool {
        match record.get("id") {
            Some(RecordValue::Number(n)) => {
                n.as_i64().is_some_and(|id| self.poisoned.contains(&id))
            }
            _ => false,
        }
    }
}

#[async_trait]
impl TableBinding for ScriptedBinding {
    async fn bulk_insert(&self, records: &[Record]) -> Result<BulkInsertOutcome> {
        self.bulk_calls.lock().unwrap().push(records.len());
        if records.len() > self.max_bulk || records.iter().any(|r| self.is_poisoned(r)) {
            return Err(AppError::Store("bulk insert rejected".to_string()));
        }
        self.inner.bulk_insert(records).await
    }

    async fn insert_one(&self, record: &Record) -> Result<()> {
        if self.is_poisoned(record) {
            return Err(AppError::Store("foreign key violation".to_string()));
        }
        self.inner.insert_one(record).await
    }

    async fn delete_all(&self) -> Result<u64> {
        self.inner.delete_all().await
    }
}
