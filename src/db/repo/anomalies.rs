//! Anomaly record operations.

use crate::domain::{AnomalyReason, AnomalyRecord};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

use super::{format_timestamp, parse_timestamp, Repository};

pub(crate) async fn insert_anomaly_conn(
    conn: &mut SqliteConnection,
    record: &AnomalyRecord,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO anomalies (recorded_at, tx_hash, issue_type, details, suggested_project_ids)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(tx_hash, issue_type) DO NOTHING
        "#,
    )
    .bind(format_timestamp(&record.recorded_at))
    .bind(&record.tx_hash)
    .bind(record.issue_type.as_str())
    .bind(&record.details)
    .bind(&record.suggested_project_ids)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

impl Repository {
    /// Stored anomaly keys as `"{tx_hash}:{issue_type}"`.
    pub async fn existing_anomaly_keys(&self) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query("SELECT tx_hash, issue_type FROM anomalies ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| {
                format!(
                    "{}:{}",
                    r.get::<String, _>("tx_hash"),
                    r.get::<String, _>("issue_type")
                )
            })
            .collect())
    }

    pub async fn insert_anomaly(&self, record: &AnomalyRecord) -> Result<bool, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        insert_anomaly_conn(&mut conn, record).await
    }

    pub async fn query_anomalies(&self) -> Result<Vec<AnomalyRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT recorded_at, tx_hash, issue_type, details, suggested_project_ids
            FROM anomalies
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let recorded_at: String = row.get("recorded_at");
                let issue_type: String = row.get("issue_type");
                AnomalyRecord {
                    recorded_at: parse_timestamp(&recorded_at),
                    tx_hash: row.get("tx_hash"),
                    issue_type: if issue_type == AnomalyReason::Ambiguous.as_str() {
                        AnomalyReason::Ambiguous
                    } else {
                        AnomalyReason::Unmapped
                    },
                    details: row.get("details"),
                    suggested_project_ids: row.get("suggested_project_ids"),
                }
            })
            .collect())
    }
}
