// snapshotrestore/src/store/mod.rs
pub mod postgres;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::errors::{AppError, Result};
use crate::restore::transform::{Record, RecordValue};

/// What a bulk insert reports back. `count` is `None` when the store cannot
/// tell how many rows it actually wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkInsertOutcome {
    pub count: Option<u64>,
}

/// Typed capability for a table the store knows how to write to directly.
#[async_trait]
pub trait TableBinding: Send + Sync {
    /// Inserts all records, silently skipping rows that collide with an existing unique key.
    async fn bulk_insert(&self, records: &[Record]) -> Result<BulkInsertOutcome>;

    /// Inserts a single record. Fails on any conflict.
    async fn insert_one(&self, record: &Record) -> Result<()>;

    /// Removes every row, returning how many were deleted.
    async fn delete_all(&self) -> Result<u64>;
}

/// Raw parameterized statement execution, used for tables without a binding.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Executes `sql` with positional parameters, returning the affected row count.
    async fn execute(&self, sql: &str, params: &[RecordValue]) -> Result<u64>;

    async fn ping(&self) -> Result<()> {
        self.execute("SELECT 1", &[]).await.map(|_| ())
    }
}

/// Table name to binding map, populated once at startup.
pub struct BindingRegistry {
    bindings: HashMap<String, Arc<dyn TableBinding>>,
    executor: Arc<dyn StatementExecutor>,
}

impl BindingRegistry {
    pub fn new(executor: Arc<dyn StatementExecutor>) -> Self {
        Self {
            bindings: HashMap::new(),
            executor,
        }
    }

    pub fn register(&mut self, table: impl Into<String>, binding: Arc<dyn TableBinding>) {
        self.bindings.insert(table.into(), binding);
    }

    pub fn binding(&self, table: &str) -> Option<Arc<dyn TableBinding>> {
        self.bindings.get(table).cloned()
    }

    pub fn executor(&self) -> Arc<dyn StatementExecutor> {
        Arc::clone(&self.executor)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }
}

fn identifier_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$"))
        .as_ref()
        .map_err(|e| AppError::Store(format!("identifier pattern failed to compile: {}", e)))
}

/// Double-quotes a table or column name after checking it is a plain identifier.
pub fn quote_identifier(name: &str) -> Result<String> {
    if identifier_pattern()?.is_match(name) {
        Ok(format!("\"{}\"", name))
    } else {
        Err(AppError::InvalidIdentifier(name.to_string()))
    }
}

/// Which jsonb expansion feeds an insert statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRows {
    /// `$1` is a single object.
    One,
    /// `$1` is an array of objects.
    Many,
}

/// Builds `INSERT INTO t (cols) SELECT cols FROM jsonb_populate_record(NULL::t, $1)`.
/// Only the listed columns are written; every other column keeps its default.
pub fn json_insert_statement<'a, I>(
    table: &str,
    columns: I,
    rows: JsonRows,
    ignore_conflicts: bool,
) -> Result<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let quoted_table = quote_identifier(table)?;
    let quoted_columns = columns
        .into_iter()
        .map(|c| quote_identifier(c))
        .collect::<Result<Vec<_>>>()?;
    if quoted_columns.is_empty() {
        return Err(AppError::Store(format!("no columns to insert into {}", table)));
    }
    let source = match rows {
        JsonRows::One => "jsonb_populate_record",
        JsonRows::Many => "jsonb_populate_recordset",
    };
    let mut sql = format!(
        "INSERT INTO {t} ({c}) SELECT {c} FROM {f}(NULL::{t}, $1)",
        t = quoted_table,
        c = quoted_columns.join(", "),
        f = source
    );
    if ignore_conflicts {
        sql.push_str(" ON CONFLICT DO NOTHING");
    }
    Ok(sql)
}
