// snapshotrestore/src/utils/sequence_reset.rs
use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::store::quote_identifier;

const SEQUENCE_RESET_TIMEOUT: Duration = Duration::from_secs(300);

/// Moves every owned sequence in the public schema past the largest value now
/// stored in its column, so inserts after a restore do not collide with restored ids.
/// Returns one warning per sequence that could not be reset.
pub async fn reset_all_sequences(db_pool: &PgPool) -> Result<Vec<String>> {
    let sequences_query = r#"
        SELECT
            seq.relname::text AS sequence_name,
            tab.relname::text AS table_name,
            attr.attname::text AS column_name
        FROM
            pg_class seq
        JOIN
            pg_depend dep ON dep.objid = seq.oid AND dep.deptype IN ('a', 'i')
        JOIN
            pg_class tab ON dep.refobjid = tab.oid
        JOIN
            pg_attribute attr ON dep.refobjid = attr.attrelid AND dep.refobjsubid = attr.attnum
        JOIN
            pg_namespace nsp ON seq.relnamespace = nsp.oid
        WHERE
            seq.relkind = 'S'
            AND tab.relkind = 'r'
            AND nsp.nspname = 'public'
        ORDER BY
            tab.relname, attr.attname
    "#;

    let sequences = sqlx::query_as::<_, (String, String, String)>(sequences_query)
        .fetch_all(db_pool)
        .await
        .context("Failed to fetch sequence information")?;

    let mut warnings = Vec::new();
    let mut reset_count = 0;
    for (sequence_name, table_name, column_name) in sequences {
        match reset_sequence(db_pool, &sequence_name, &table_name, &column_name).await {
            Ok(next_val) => {
                reset_count += 1;
                info!(sequence = %sequence_name, next_val, "Reset sequence");
            }
            Err(e) => {
                warn!(sequence = %sequence_name, error = %e, "Failed to reset sequence");
                warnings.push(format!("Could not reset sequence {}: {:#}", sequence_name, e));
            }
        }
    }

    println!(
        "🔄 Sequence reset completed: {} successful, {} errors",
        reset_count,
        warnings.len()
    );
    Ok(warnings)
}

async fn reset_sequence(
    db_pool: &PgPool,
    sequence_name: &str,
    table_name: &str,
    column_name: &str,
) -> Result<i64> {
    let max_value_query = format!(
        "SELECT COALESCE(MAX({})::bigint, 0) AS max_val FROM {}",
        quote_identifier(column_name)?,
        quote_identifier(table_name)?
    );
    let row = sqlx::query(&max_value_query)
        .fetch_one(db_pool)
        .await
        .with_context(|| format!("Failed to get max value for table {}", table_name))?;
    let next_val = row.try_get::<i64, _>("max_val")? + 1;

    sqlx::query("SELECT setval($1::regclass, $2, false)")
        .bind(quote_identifier(sequence_name)?)
        .bind(next_val)
        .execute(db_pool)
        .await
        .with_context(|| format!("Failed to set sequence {}", sequence_name))?;
    Ok(next_val)
}

/// Same as [`reset_all_sequences`], bounded by a five minute timeout.
pub async fn reset_sequences_with_timeout(db_pool: &PgPool) -> Result<Vec<String>> {
    match timeout(SEQUENCE_RESET_TIMEOUT, reset_all_sequences(db_pool)).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "Sequence reset operation timed out after {} seconds",
            SEQUENCE_RESET_TIMEOUT.as_secs()
        )),
    }
}
