//! Snapshot Restore Tool
//!
//! Restores a relational database from the newest directory of per-table JSON backups

// snapshotrestore/src/main.rs
mod config;
mod errors;
mod restore;
mod store;
mod utils;

use anyhow::{Context, Result};
use config::{RawJsonConfig, load_restore_config};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Main entry point for the restore tool
#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    match run_app().await {
        Ok(_) => {
            println!("✅ Restore completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("RESTORE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_app() -> Result<()> {
    dotenv::dotenv().ok();

    // First argument is the config path; config.json in the working directory otherwise.
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.json"));
    let mut raw_config = RawJsonConfig::load_from_json(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    raw_config
        .apply_env_overrides(|key| env::var(key).ok())
        .context("Failed to apply environment overrides")?;
    let restore_config = load_restore_config(&raw_config).context("Invalid restore configuration")?;

    println!("🔄 Starting Restore Process...");
    println!(
        "Restore target: {}, Backup root: {}",
        utils::setting::redact_db_url(&restore_config.target_db_url),
        restore_config.backup_root.display()
    );

    let stats = restore::run_restore_flow(&restore_config)
        .await
        .context("Restore process failed")?;
    tracing::info!(
        tables = stats.tables_processed,
        restored = stats.records_restored,
        skipped = stats.records_skipped,
        "Restore finished"
    );
    Ok(())
}
