//! Memo cache and memo fetch queue.
//!
//! Cache expiry and queue timestamps are unix seconds, passed in by the
//! caller so expiry is testable.

use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

use super::Repository;

pub(crate) async fn enqueue_memo_conn(
    conn: &mut SqliteConnection,
    tx_hash: &str,
    queued_at: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO memo_queue (tx_hash, queued_at) VALUES (?, ?) ON CONFLICT(tx_hash) DO NOTHING",
    )
    .bind(tx_hash)
    .bind(queued_at)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

impl Repository {
    /// Cached memo if present and not expired at `now`.
    pub async fn get_cached_memo(
        &self,
        tx_hash: &str,
        now: i64,
    ) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query("SELECT memo FROM memo_cache WHERE tx_hash = ? AND expires_at > ?")
            .bind(tx_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("memo")))
    }

    pub async fn put_cached_memo(
        &self,
        tx_hash: &str,
        memo: &str,
        ttl_secs: i64,
        now: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO memo_cache (tx_hash, memo, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(tx_hash) DO UPDATE SET
                memo = excluded.memo,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(tx_hash)
        .bind(memo)
        .bind(now + ttl_secs)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Drop expired cache entries; returns how many were removed.
    pub async fn purge_expired_memos(&self, now: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM memo_cache WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Oldest queued hashes first, at most `limit`.
    pub async fn peek_memo_queue(&self, limit: usize) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT tx_hash FROM memo_queue ORDER BY queued_at ASC, tx_hash ASC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| r.get("tx_hash")).collect())
    }

    pub async fn dequeue_memos(&self, hashes: &[String]) -> Result<u64, sqlx::Error> {
        if hashes.is_empty() {
            return Ok(0);
        }
        let mut removed = 0u64;
        let mut tx = self.pool.begin().await?;
        for hash in hashes {
            let result = sqlx::query("DELETE FROM memo_queue WHERE tx_hash = ?")
                .bind(hash)
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected();
        }
        tx.commit().await?;
        Ok(removed)
    }

    pub async fn memo_queue_len(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM memo_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}
