use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No backup snapshot found under {}", .0.display())]
    NoSnapshot(PathBuf),

    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Store operation failed: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
