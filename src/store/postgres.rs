// snapshotrestore/src/store/postgres.rs
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    BindingRegistry, BulkInsertOutcome, JsonRows, StatementExecutor, TableBinding,
    json_insert_statement, quote_identifier,
};
use crate::errors::{AppError, Result};
use crate::restore::transform::{Record, RecordValue};

/// Opens a small pool against the target database.
pub async fn connect(target_db_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(target_db_url)
        .await?;
    Ok(pool)
}

/// Builds the registry from the live schema: every public base table with a
/// primary key gets a typed binding, the rest are reached through raw statements.
pub async fn introspect_registry(pool: &PgPool) -> Result<BindingRegistry> {
    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT t.table_name::text
         FROM information_schema.tables t
         WHERE t.table_schema = 'public'
           AND t.table_type = 'BASE TABLE'
           AND EXISTS (
               SELECT 1 FROM information_schema.table_constraints c
               WHERE c.table_schema = t.table_schema
                 AND c.table_name = t.table_name
                 AND c.constraint_type = 'PRIMARY KEY'
           )
         ORDER BY t.table_name",
    )
    .fetch_all(pool)
    .await?;

    let mut registry = BindingRegistry::new(Arc::new(PgStatementExecutor::new(pool.clone())));
    for (table,) in tables {
        match PgTableBinding::new(pool.clone(), &table) {
            Ok(binding) => registry.register(table, Arc::new(binding)),
            Err(e) => debug!(table = %table, error = %e, "Not binding table"),
        }
    }
    info!(bound_tables = registry.len(), "Introspected target schema");
    Ok(registry)
}

pub struct PgTableBinding {
    pool: PgPool,
    table: String,
    quoted_table: String,
}

impl PgTableBinding {
    pub fn new(pool: PgPool, table: &str) -> Result<Self> {
        Ok(Self {
            pool,
            table: table.to_string(),
            quoted_table: quote_identifier(table)?,
        })
    }
}

/// Columns named by any record of the batch. Columns outside this set are left
/// to their defaults.
fn bulk_insert_sql(table: &str, records: &[Record]) -> Result<String> {
    let columns: BTreeSet<&String> = records.iter().flat_map(|r| r.keys()).collect();
    json_insert_statement(table, columns, JsonRows::Many, true)
}

fn insert_one_sql(table: &str, record: &Record) -> Result<String> {
    json_insert_statement(table, record.keys(), JsonRows::One, false)
}

#[async_trait]
impl TableBinding for PgTableBinding {
    async fn bulk_insert(&self, records: &[Record]) -> Result<BulkInsertOutcome> {
        if records.is_empty() {
            return Ok(BulkInsertOutcome { count: Some(0) });
        }
        let sql = bulk_insert_sql(&self.table, records)?;
        let payload = serde_json::to_value(records)?;
        let result = sqlx::query(&sql)
            .bind(Json(payload))
            .execute(&self.pool)
            .await?;
        Ok(BulkInsertOutcome {
            count: Some(result.rows_affected()),
        })
    }

    async fn insert_one(&self, record: &Record) -> Result<()> {
        let sql = insert_one_sql(&self.table, record)?;
        let payload = serde_json::to_value(record)?;
        sqlx::query(&sql)
            .bind(Json(payload))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query(&format!("DELETE FROM {}", self.quoted_table))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

pub struct PgStatementExecutor {
    pool: PgPool,
}

impl PgStatementExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &RecordValue,
) -> Result<Query<'q, Postgres, PgArguments>> {
    let query = match value {
        RecordValue::Null => query.bind(Option::<String>::None),
        RecordValue::Bool(b) => query.bind(*b),
        RecordValue::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => query.bind(i),
            (None, Some(f)) => query.bind(f),
            (None, None) => {
                return Err(AppError::Store(format!("unrepresentable number {}", n)));
            }
        },
        RecordValue::String(s) => query.bind(s.clone()),
        RecordValue::Date(d) => query.bind(*d),
        RecordValue::List(_) | RecordValue::Map(_) => {
            query.bind(Json(serde_json::to_value(value)?))
        }
    };
    Ok(query)
}

#[async_trait]
impl StatementExecutor for PgStatementExecutor {
    async fn execute(&self, sql: &str, params: &[RecordValue]) -> Result<u64> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_value(query, param)?;
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
