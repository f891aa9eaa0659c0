//! Ledger row, balance change and per-fund commit operations.

use crate::domain::{
    Address, AnomalyRecord, BalanceChange, ClassReason, CounterpartyType, Decimal, Direction,
    LedgerRow, MappingMethod, StoredTransfer, TransferKey,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::warn;

use super::{format_timestamp, insert_sync_log_conn, parse_timestamp, upsert_cursor, Repository, SyncLogEntry};

/// Everything one fund account's sync pass writes, committed atomically.
#[derive(Debug, Clone, Default)]
pub struct FundBatch {
    pub fund_key: String,
    pub rows: Vec<LedgerRow>,
    pub anomalies: Vec<AnomalyRecord>,
    pub balance_changes: Vec<BalanceChange>,
    pub memo_hashes: Vec<String>,
    /// New cursor position; `None` leaves the stored cursor untouched.
    pub cursor: Option<String>,
    pub log: Option<SyncLogEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    pub rows_inserted: usize,
    pub anomalies_inserted: usize,
    pub balance_changes_inserted: usize,
    pub memos_queued: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassUpdate {
    pub id: i64,
    pub class: String,
    pub class_reason: ClassReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectUpdate {
    pub id: i64,
    pub project_id: String,
    pub mapping_method: MappingMethod,
}

const INSERT_TRANSFER: &str = r#"
    INSERT INTO transfers (
        section, created_at, from_address, from_label, to_address, to_label,
        asset_code, asset_issuer, asset_key, amount, memo, tx_hash, fund_key,
        op_id, counterparty_type, project_id, mapping_method, class, class_reason,
        class_override, project_override, tags, inserted_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(tx_hash, op_id) DO NOTHING
"#;

impl Repository {
    /// All stored `(tx_hash, op_id)` keys.
    pub async fn existing_transfer_keys(&self) -> Result<HashSet<TransferKey>, sqlx::Error> {
        let rows = sqlx::query("SELECT tx_hash, op_id FROM transfers")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| TransferKey::new(r.get::<String, _>("tx_hash"), r.get::<String, _>("op_id")))
            .collect())
    }

    /// Write one fund's rows, anomalies, balance changes, memo queue entries,
    /// cursor and log entry in a single transaction.
    pub async fn commit_fund_batch(&self, batch: &FundBatch) -> Result<CommitOutcome, sqlx::Error> {
        let inserted_at = format_timestamp(&chrono::Utc::now());
        let queued_at = chrono::Utc::now().timestamp();
        let mut outcome = CommitOutcome::default();
        let mut tx = self.pool.begin().await?;

        for row in &batch.rows {
            let result = sqlx::query(INSERT_TRANSFER)
                .bind(row.direction.as_str())
                .bind(format_timestamp(&row.created_at))
                .bind(row.from.as_str())
                .bind(&row.from_label)
                .bind(row.to.as_str())
                .bind(&row.to_label)
                .bind(&row.asset_code)
                .bind(row.asset_issuer.as_str())
                .bind(&row.asset_key)
                .bind(row.amount.to_canonical_string())
                .bind(&row.memo)
                .bind(&row.tx_hash)
                .bind(&row.fund_key)
                .bind(&row.op_id)
                .bind(row.counterparty_type.as_str())
                .bind(&row.project_id)
                .bind(row.mapping_method.map(|m| m.as_str()))
                .bind(&row.class)
                .bind(row.class_reason.map(|r| r.as_str()))
                .bind(row.class_override.as_deref())
                .bind(row.project_override.as_deref())
                .bind(&row.tags)
                .bind(&inserted_at)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() > 0 {
                outcome.rows_inserted += 1;
            }
        }

        for record in &batch.anomalies {
            if super::anomalies::insert_anomaly_conn(&mut tx, record).await? {
                outcome.anomalies_inserted += 1;
            }
        }

        for change in &batch.balance_changes {
            let result = sqlx::query(
                r#"
                INSERT INTO balance_changes (fund_account, asset_key, change_amount, tx_hash, op_id, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(fund_account, tx_hash, op_id) DO NOTHING
                "#,
            )
            .bind(change.fund_account.as_str())
            .bind(&change.asset_key)
            .bind(change.change_amount.to_canonical_string())
            .bind(&change.tx_hash)
            .bind(&change.op_id)
            .bind(format_timestamp(&change.created_at))
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() > 0 {
                outcome.balance_changes_inserted += 1;
            }
        }

        for hash in &batch.memo_hashes {
            if super::memos::enqueue_memo_conn(&mut tx, hash, queued_at).await? {
                outcome.memos_queued += 1;
            }
        }

        if let Some(cursor) = batch.cursor.as_deref() {
            upsert_cursor(&mut tx, &batch.fund_key, cursor).await?;
        }
        if let Some(entry) = &batch.log {
            insert_sync_log_conn(&mut tx, entry).await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }

    /// Every stored row in insertion order.
    pub async fn load_transfers(&self) -> Result<Vec<StoredTransfer>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, section, created_at, from_address, from_label, to_address, to_label,
                   asset_code, asset_issuer, asset_key, amount, memo, tx_hash, fund_key,
                   op_id, counterparty_type, project_id, mapping_method, class, class_reason,
                   class_override, project_override, tags
            FROM transfers
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(stored_transfer_from_row).collect())
    }

    /// Apply class changes in one transaction. Rows with a class override are never touched.
    pub async fn apply_class_updates(&self, updates: &[ClassUpdate]) -> Result<usize, sqlx::Error> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut updated = 0usize;
        let mut tx = self.pool.begin().await?;
        for update in updates {
            let result = sqlx::query(
                r#"
                UPDATE transfers SET class = ?, class_reason = ?
                WHERE id = ? AND (class_override IS NULL OR TRIM(class_override) = '')
                "#,
            )
            .bind(&update.class)
            .bind(update.class_reason.as_str())
            .bind(update.id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() > 0 {
                updated += 1;
            }
        }
        tx.commit().await?;
        Ok(updated)
    }

    /// Apply project changes and record new anomalies in one transaction.
    ///
    /// Returns `(rows_updated, anomalies_inserted)`.
    pub async fn apply_project_updates(
        &self,
        updates: &[ProjectUpdate],
        anomalies: &[AnomalyRecord],
    ) -> Result<(usize, usize), sqlx::Error> {
        let mut updated = 0usize;
        let mut inserted = 0usize;
        let mut tx = self.pool.begin().await?;

        for update in updates {
            let result = sqlx::query(
                r#"
                UPDATE transfers SET project_id = ?, mapping_method = ?
                WHERE id = ? AND (project_override IS NULL OR TRIM(project_override) = '')
                "#,
            )
            .bind(&update.project_id)
            .bind(update.mapping_method.as_str())
            .bind(update.id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() > 0 {
                updated += 1;
            }
        }

        for record in anomalies {
            if super::anomalies::insert_anomaly_conn(&mut tx, record).await? {
                inserted += 1;
            }
        }

        tx.commit().await?;
        Ok((updated, inserted))
    }

    /// Manually pin a row's class. Later reclassification leaves it alone.
    pub async fn set_class_override(
        &self,
        key: &TransferKey,
        class_override: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE transfers SET class_override = ? WHERE tx_hash = ? AND op_id = ?")
                .bind(class_override)
                .bind(&key.tx_hash)
                .bind(&key.op_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Manually pin a row's project. Later remapping leaves it alone.
    pub async fn set_project_override(
        &self,
        key: &TransferKey,
        project_override: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE transfers SET project_override = ? WHERE tx_hash = ? AND op_id = ?",
        )
        .bind(project_override)
        .bind(&key.tx_hash)
        .bind(&key.op_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fill in memos on rows whose memo is still empty. Returns rows updated.
    pub async fn fill_missing_memos(&self, memos: &[(String, String)]) -> Result<u64, sqlx::Error> {
        if memos.is_empty() {
            return Ok(0);
        }

        let mut updated = 0u64;
        let mut tx = self.pool.begin().await?;
        for (tx_hash, memo) in memos {
            if memo.is_empty() {
                continue;
            }
            let result = sqlx::query("UPDATE transfers SET memo = ? WHERE tx_hash = ? AND memo = ''")
                .bind(memo)
                .bind(tx_hash)
                .execute(&mut *tx)
                .await?;
            updated += result.rows_affected();
        }
        tx.commit().await?;
        Ok(updated)
    }

    /// Balance changes for one fund account in insertion order.
    pub async fn query_balance_changes(
        &self,
        fund_account: &Address,
    ) -> Result<Vec<BalanceChange>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT fund_account, asset_key, change_amount, tx_hash, op_id, created_at
            FROM balance_changes
            WHERE fund_account = ?
            ORDER BY id ASC
            "#,
        )
        .bind(fund_account.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let amount_str: String = row.get("change_amount");
                let created_at: String = row.get("created_at");
                BalanceChange {
                    fund_account: Address::new(row.get::<String, _>("fund_account")),
                    asset_key: row.get("asset_key"),
                    change_amount: parse_amount(&amount_str),
                    tx_hash: row.get("tx_hash"),
                    op_id: row.get("op_id"),
                    created_at: parse_timestamp(&created_at),
                }
            })
            .collect())
    }
}

fn parse_amount(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap_or_else(|e| {
        warn!(amount = %raw, error = %e, "Failed to parse stored amount, using default");
        Decimal::default()
    })
}

fn stored_transfer_from_row(row: &SqliteRow) -> StoredTransfer {
    let created_at: String = row.get("created_at");
    let amount: String = row.get("amount");
    let section: String = row.get("section");
    let counterparty_type: String = row.get("counterparty_type");
    let mapping_method: Option<String> = row.get("mapping_method");
    let class_reason: Option<String> = row.get("class_reason");

    StoredTransfer {
        id: row.get("id"),
        row: LedgerRow {
            direction: Direction::parse(&section),
            created_at: parse_timestamp(&created_at),
            from: Address::new(row.get::<String, _>("from_address")),
            from_label: row.get("from_label"),
            to: Address::new(row.get::<String, _>("to_address")),
            to_label: row.get("to_label"),
            asset_code: row.get("asset_code"),
            asset_issuer: Address::new(row.get::<String, _>("asset_issuer")),
            asset_key: row.get("asset_key"),
            amount: parse_amount(&amount),
            memo: row.get("memo"),
            tx_hash: row.get("tx_hash"),
            fund_key: row.get("fund_key"),
            op_id: row.get("op_id"),
            counterparty_type: CounterpartyType::parse(&counterparty_type),
            project_id: row.get("project_id"),
            mapping_method: mapping_method.as_deref().and_then(MappingMethod::parse),
            class: row.get("class"),
            class_reason: class_reason.as_deref().and_then(ClassReason::parse),
            class_override: row.get("class_override"),
            project_override: row.get("project_override"),
            tags: row.get("tags"),
        },
    }
}
