use thiserror::Error;

use crate::config::ConfigError;
use crate::datasource::ReferenceError;
use crate::orchestration::{MemoError, RecomputeError, SyncError};

/// Top-level failure of a CLI command.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Reference data error: {0}")]
    Reference(#[from] ReferenceError),
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),
    #[error("Memo backfill failed: {0}")]
    Memos(#[from] MemoError),
    #[error("Recompute failed: {0}")]
    Recompute(#[from] RecomputeError),
}
