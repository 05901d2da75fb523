// snapshotrestore/src/restore/snapshot.rs
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::errors::{AppError, Result};

const TABLE_FILE_EXTENSION: &str = "json";

/// Finds the newest snapshot under `backup_root`: the immediate subdirectory
/// with the greatest name. A missing or unreadable root yields `None`.
pub fn locate_latest_snapshot(backup_root: &Path) -> Option<PathBuf> {
    WalkDir::new(backup_root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .max_by(|a, b| a.file_name().cmp(b.file_name()))
        .map(|entry| entry.into_path())
}

/// One dated backup directory holding `<table>.json` files.
#[derive(Debug, Clone)]
pub struct Snapshot {
    dir: PathBuf,
}

impl Snapshot {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn name(&self) -> String {
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.dir.display().to_string())
    }

    pub fn table_file(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", table, TABLE_FILE_EXTENSION))
    }

    /// Names of the tables that have a file in this snapshot.
    pub fn table_names(&self) -> Result<BTreeSet<String>> {
        let mut tables = BTreeSet::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| AppError::Io(std::io::Error::other(e)))?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(TABLE_FILE_EXTENSION)
            {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                tables.insert(stem.to_string());
            }
        }
        Ok(tables)
    }
}

/// Parses a table file as one JSON array. The file is read through a buffered
/// reader on the blocking pool; the parsed rows are all held in memory.
pub async fn read_table_file(path: PathBuf) -> Result<Vec<serde_json::Value>> {
    tokio::task::spawn_blocking(move || -> Result<Vec<serde_json::Value>> {
        let file = File::open(&path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    })
    .await
    .map_err(|e| AppError::Io(std::io::Error::other(e)))?
}
