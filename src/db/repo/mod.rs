//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `transfers.rs` - Ledger rows, balance changes and the per-fund commit
//! - `anomalies.rs` - Anomaly records
//! - `memos.rs` - Memo cache and fetch queue

mod anomalies;
mod memos;
mod transfers;

pub use transfers::{ClassUpdate, CommitOutcome, FundBatch, ProjectUpdate};

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqliteConnection};
use sqlx::Row;
use tracing::warn;

/// One structured run summary in `sync_log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncLogEntry {
    pub run_id: String,
    pub stage: String,
    pub fund_key: String,
    pub logged_at: DateTime<Utc>,
    /// JSON document with the stage's counters.
    pub details: String,
}

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Cursor operations
    // =========================================================================

    /// Stored paging cursor for a fund account key.
    pub async fn get_cursor(&self, account_key: &str) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query("SELECT cursor FROM cursors WHERE account_key = ?")
            .bind(account_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("cursor")))
    }

    pub async fn set_cursor(&self, account_key: &str, cursor: &str) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        upsert_cursor(&mut conn, account_key, cursor).await
    }

    /// Delete every stored cursor; returns how many were removed.
    pub async fn reset_cursors(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cursors")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Sync log operations
    // =========================================================================

    pub async fn insert_sync_log(&self, entry: &SyncLogEntry) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        insert_sync_log_conn(&mut conn, entry).await
    }

    /// Log entries for one run in insertion order.
    pub async fn query_sync_log(&self, run_id: &str) -> Result<Vec<SyncLogEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT run_id, stage, fund_key, logged_at, details
            FROM sync_log
            WHERE run_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let logged_at: String = row.get("logged_at");
                SyncLogEntry {
                    run_id: row.get("run_id"),
                    stage: row.get("stage"),
                    fund_key: row.get("fund_key"),
                    logged_at: parse_timestamp(&logged_at),
                    details: row.get("details"),
                }
            })
            .collect())
    }
}

pub(crate) async fn upsert_cursor(
    conn: &mut SqliteConnection,
    account_key: &str,
    cursor: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO cursors (account_key, cursor, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(account_key) DO UPDATE SET
            cursor = excluded.cursor,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(account_key)
    .bind(cursor)
    .bind(format_timestamp(&Utc::now()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn insert_sync_log_conn(
    conn: &mut SqliteConnection,
    entry: &SyncLogEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO sync_log (run_id, stage, fund_key, logged_at, details)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.run_id)
    .bind(&entry.stage)
    .bind(&entry.fund_key)
    .bind(format_timestamp(&entry.logged_at))
    .bind(&entry.details)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// RFC 3339 with second precision; sorts lexicographically.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!(value = %raw, error = %e, "Failed to parse stored timestamp, using epoch");
            DateTime::<Utc>::default()
        })
}
