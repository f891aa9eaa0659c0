//! Memo backfill: resolve queued transaction memos and fill empty ledger memos.

use crate::datasource::LedgerClient;
use crate::db::{Repository, SyncLogEntry};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const MEMO_STAGE: &str = "memos";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoOptions {
    /// Most queued hashes handled in one run.
    pub max_per_run: usize,
    pub cache_ttl_secs: i64,
    /// Concurrent transaction lookups.
    pub concurrency: usize,
}

impl Default for MemoOptions {
    fn default() -> Self {
        Self {
            max_per_run: 300,
            cache_ttl_secs: 21_600,
            concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoReport {
    pub run_id: String,
    pub purged_cache_entries: u64,
    pub queued: usize,
    pub cache_hits: usize,
    pub fetched: usize,
    pub failed: usize,
    pub rows_filled: u64,
    pub dequeued: u64,
}

#[derive(Debug, Error)]
pub enum MemoError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("failed to serialize run log: {0}")]
    Log(#[from] serde_json::Error),
}

pub struct MemoBackfiller {
    client: Arc<dyn LedgerClient>,
    repo: Arc<Repository>,
    options: MemoOptions,
}

impl MemoBackfiller {
    pub fn new(client: Arc<dyn LedgerClient>, repo: Arc<Repository>, options: MemoOptions) -> Self {
        Self {
            client,
            repo,
            options,
        }
    }

    /// Work through the oldest queued hashes. Hashes whose lookup fails stay
    /// queued for the next run.
    pub async fn run(&self) -> Result<MemoReport, MemoError> {
        let now = Utc::now().timestamp();
        let mut report = MemoReport {
            run_id: Uuid::new_v4().to_string(),
            ..Default::default()
        };

        report.purged_cache_entries = self.repo.purge_expired_memos(now).await?;
        let queued = self.repo.peek_memo_queue(self.options.max_per_run).await?;
        report.queued = queued.len();
        if queued.is_empty() {
            info!(run_id = %report.run_id, "Memo queue is empty");
            return Ok(report);
        }

        let mut resolved: Vec<(String, String)> = Vec::with_capacity(queued.len());
        let mut to_fetch = Vec::new();
        for hash in queued {
            match self.repo.get_cached_memo(&hash, now).await? {
                Some(memo) => {
                    report.cache_hits += 1;
                    resolved.push((hash, memo));
                }
                None => to_fetch.push(hash),
            }
        }

        let results: Vec<_> = stream::iter(to_fetch)
            .map(|hash| {
                let client = Arc::clone(&self.client);
                async move {
                    let result = client.fetch_transaction_memo(&hash).await;
                    (hash, result)
                }
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        for (hash, result) in results {
            match result {
                Ok(memo) => {
                    self.repo
                        .put_cached_memo(&hash, &memo, self.options.cache_ttl_secs, now)
                        .await?;
                    report.fetched += 1;
                    resolved.push((hash, memo));
                }
                Err(e) => {
                    warn!(tx_hash = %hash, error = %e, "Memo fetch failed, leaving queued");
                    report.failed += 1;
                }
            }
        }

        report.rows_filled = self.repo.fill_missing_memos(&resolved).await?;
        let hashes: Vec<String> = resolved.into_iter().map(|(hash, _)| hash).collect();
        report.dequeued = self.repo.dequeue_memos(&hashes).await?;

        self.repo
            .insert_sync_log(&SyncLogEntry {
                run_id: report.run_id.clone(),
                stage: MEMO_STAGE.to_string(),
                fund_key: String::new(),
                logged_at: Utc::now(),
                details: serde_json::to_string(&report)?,
            })
            .await?;

        info!(
            run_id = %report.run_id,
            queued = report.queued,
            cache_hits = report.cache_hits,
            fetched = report.fetched,
            failed = report.failed,
            rows_filled = report.rows_filled,
            "Memo backfill finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = MemoOptions::default();
        assert_eq!(options.max_per_run, 300);
        assert_eq!(options.cache_ttl_secs, 6 * 3600);
        assert!(options.concurrency > 0);
    }
}
