//! Incremental sync of fund account payments into the ledger.

use super::ReferenceContext;
use crate::datasource::LedgerClient;
use crate::db::{FundBatch, Repository, SyncLogEntry};
use crate::domain::{
    normalize_token_part, Address, AnomalyRecord, BalanceChange, Decimal, FundAccount, LedgerRow,
    RawPayment, TokenFilter, Transfer, TransferKey, AMBIGUOUS_PROJECT, UNMAPPED_PROJECT,
};
use crate::engine::{counterparty_type, AnomalyKeySet, RoleFilter, Roles};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const SYNC_STAGE: &str = "sync";

/// Filters and limits for one sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Records before this instant are dropped.
    pub start: Option<DateTime<Utc>>,
    /// Records at or after this instant are dropped and paging stops.
    pub end_exclusive: Option<DateTime<Utc>>,
    pub token_filter: TokenFilter,
    pub role_filter: RoleFilter,
    pub include_native: bool,
    /// Normalized `CODE:ISSUER` keys.
    pub asset_allowlist: Vec<String>,
    pub asset_blocklist: Vec<String>,
    pub min_amount: Decimal,
    pub page_limit: u32,
    pub fund_tags: HashMap<String, String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            start: None,
            end_exclusive: None,
            token_filter: TokenFilter::default(),
            role_filter: RoleFilter::default(),
            include_native: false,
            asset_allowlist: Vec::new(),
            asset_blocklist: Vec::new(),
            min_amount: Decimal::from_str_canonical("0.01").unwrap_or_default(),
            page_limit: 200,
            fund_tags: HashMap::new(),
        }
    }
}

/// Per-fund counters for one run. Persisted as JSON in `sync_log`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FundSyncStats {
    pub fund_key: String,
    pub address: String,
    pub cursor_before: Option<String>,
    pub cursor_after: Option<String>,
    pub token_filter_mode: &'static str,
    pub fetched: usize,
    pub drop_type: usize,
    pub drop_native: usize,
    pub drop_date: usize,
    pub drop_malformed: usize,
    pub drop_min_amount: usize,
    pub drop_scope: usize,
    pub drop_role: usize,
    pub drop_no_tx_hash: usize,
    pub drop_duplicate: usize,
    pub dedup_skipped: usize,
    pub drop_asset_filter: usize,
    pub drop_token_filter: usize,
    pub rows_appended: usize,
    pub anomalies_recorded: usize,
    pub memo_cache_hits: usize,
    pub memo_queued: usize,
    pub unmapped: usize,
    pub ambiguous: usize,
    pub classified: BTreeMap<String, usize>,
    pub reached_end_date: bool,
    pub error: Option<String>,
}

impl FundSyncStats {
    fn new(fund: &FundAccount, cursor_before: Option<String>, token_filter: &TokenFilter) -> Self {
        Self {
            fund_key: fund.key.clone(),
            address: fund.address.to_string(),
            cursor_after: cursor_before.clone(),
            cursor_before,
            token_filter_mode: token_filter.mode(),
            ..Default::default()
        }
    }

    fn drop_counters(&self) -> [(&'static str, usize); 12] {
        [
            ("type", self.drop_type),
            ("native", self.drop_native),
            ("date", self.drop_date),
            ("malformed", self.drop_malformed),
            ("min_amount", self.drop_min_amount),
            ("counterparty_scope", self.drop_scope),
            ("role", self.drop_role),
            ("no_tx_hash", self.drop_no_tx_hash),
            ("duplicate", self.drop_duplicate),
            ("dedup", self.dedup_skipped),
            ("asset_filter", self.drop_asset_filter),
            ("token_filter", self.drop_token_filter),
        ]
    }

    /// Why nothing was emitted: the largest drop counter, if any record was dropped.
    pub fn dominant_drop_reason(&self) -> Option<&'static str> {
        if self.rows_appended > 0 {
            return None;
        }
        self.drop_counters()
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .fold(None, |best: Option<(&'static str, usize)>, (name, n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((name, n)),
            })
            .map(|(name, _)| name)
    }
}

/// Summary of one sync run across all fund accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub run_id: String,
    pub funds: Vec<FundSyncStats>,
}

impl SyncReport {
    pub fn rows_appended(&self) -> usize {
        self.funds.iter().map(|f| f.rows_appended).sum()
    }

    pub fn anomalies_recorded(&self) -> usize {
        self.funds.iter().map(|f| f.anomalies_recorded).sum()
    }

    pub fn failed_funds(&self) -> Vec<&str> {
        self.funds
            .iter()
            .filter(|f| f.error.is_some())
            .map(|f| f.fund_key.as_str())
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("failed to serialize run log: {0}")]
    Log(#[from] serde_json::Error),
}

/// Keys shared across all fund accounts of one run.
struct RunState {
    existing_keys: HashSet<TransferKey>,
    anomaly_keys: AnomalyKeySet,
}

/// Keys seen during one fund's pass.
#[derive(Default)]
struct PassState {
    seen: HashSet<TransferKey>,
    queued_memos: HashSet<String>,
}

/// What happened to a single record.
enum Step {
    Continue,
    StopAtEndDate,
}

pub struct Syncer {
    client: Arc<dyn LedgerClient>,
    repo: Arc<Repository>,
    context: Arc<ReferenceContext>,
    options: SyncOptions,
}

impl Syncer {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        repo: Arc<Repository>,
        context: Arc<ReferenceContext>,
        options: SyncOptions,
    ) -> Self {
        Self {
            client,
            repo,
            context,
            options,
        }
    }

    /// Sync every fund account once, serially.
    ///
    /// A ledger API failure ends only that fund's pass; database errors abort the run.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let run_id = Uuid::new_v4().to_string();
        let mut state = RunState {
            existing_keys: self.repo.existing_transfer_keys().await?,
            anomaly_keys: AnomalyKeySet::from_keys(self.repo.existing_anomaly_keys().await?),
        };
        info!(
            run_id = %run_id,
            existing_rows = state.existing_keys.len(),
            existing_anomalies = state.anomaly_keys.len(),
            residents = self.context.directory.resident_count(),
            "Starting sync"
        );

        let mut funds = Vec::new();
        for fund in self.context.directory.funds() {
            let stats = self.sync_fund(fund, &run_id, &mut state).await?;
            funds.push(stats);
        }

        let report = SyncReport { run_id, funds };
        info!(
            run_id = %report.run_id,
            rows_appended = report.rows_appended(),
            anomalies = report.anomalies_recorded(),
            failed_funds = report.failed_funds().len(),
            "Sync finished"
        );
        Ok(report)
    }

    async fn sync_fund(
        &self,
        fund: &FundAccount,
        run_id: &str,
        state: &mut RunState,
    ) -> Result<FundSyncStats, SyncError> {
        let cursor_before = self.repo.get_cursor(&fund.key).await?;
        let mut stats =
            FundSyncStats::new(fund, cursor_before.clone(), &self.options.token_filter);
        let mut batch = FundBatch {
            fund_key: fund.key.clone(),
            ..Default::default()
        };
        let mut pass = PassState::default();
        let mut cursor = cursor_before.clone();
        let now = Utc::now();

        'pages: loop {
            let page = match self
                .client
                .fetch_payments_page(fund.address.as_str(), cursor.as_deref(), self.options.page_limit)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(fund = %fund.key, cursor = ?cursor, error = %e, "Ledger API error, stopping this fund");
                    stats.error = Some(e.to_string());
                    break;
                }
            };
            if page.records.is_empty() {
                break;
            }

            for record in &page.records {
                stats.fetched += 1;
                let step = self
                    .process_record(fund, record, now, state, &mut pass, &mut stats, &mut batch)
                    .await?;
                if let Step::StopAtEndDate = step {
                    stats.reached_end_date = true;
                    break 'pages;
                }
                cursor = Some(record.paging_token.clone());
            }

            if page.next_cursor.is_none() {
                break;
            }
        }

        stats.rows_appended = batch.rows.len();
        stats.anomalies_recorded = batch.anomalies.len();
        stats.cursor_after = cursor.clone();
        if cursor != cursor_before {
            batch.cursor = cursor;
        }

        let mut details = serde_json::to_value(&stats)?;
        if let Some(reason) = stats.dominant_drop_reason() {
            details["dominant_drop_reason"] = serde_json::Value::from(reason);
        }
        batch.log = Some(SyncLogEntry {
            run_id: run_id.to_string(),
            stage: SYNC_STAGE.to_string(),
            fund_key: fund.key.clone(),
            logged_at: Utc::now(),
            details: details.to_string(),
        });

        let outcome = self.repo.commit_fund_batch(&batch).await?;

        info!(
            fund = %fund.key,
            cursor_before = ?stats.cursor_before,
            cursor_after = ?stats.cursor_after,
            fetched = stats.fetched,
            rows_appended = outcome.rows_inserted,
            anomalies = outcome.anomalies_inserted,
            dedup_skipped = stats.dedup_skipped,
            memo_queued = outcome.memos_queued,
            unmapped = stats.unmapped,
            ambiguous = stats.ambiguous,
            dominant_drop_reason = stats.dominant_drop_reason().unwrap_or("-"),
            "Fund synced"
        );
        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_record(
        &self,
        fund: &FundAccount,
        record: &RawPayment,
        now: DateTime<Utc>,
        state: &mut RunState,
        pass: &mut PassState,
        stats: &mut FundSyncStats,
        batch: &mut FundBatch,
    ) -> Result<Step, SyncError> {
        let options = &self.options;

        let Some(created_at) = record.created_at else {
            warn!(fund = %fund.key, op_id = record.op_id(), "Payment without created_at, skipping");
            stats.drop_malformed += 1;
            return Ok(Step::Continue);
        };
        // Ascending order: everything after the first late record is late too.
        if options.end_exclusive.is_some_and(|end| created_at >= end) {
            stats.drop_date += 1;
            return Ok(Step::StopAtEndDate);
        }

        if !record.is_payment() {
            stats.drop_type += 1;
            return Ok(Step::Continue);
        }
        if record.is_native() && !options.include_native {
            stats.drop_native += 1;
            return Ok(Step::Continue);
        }
        if options.start.is_some_and(|start| created_at < start) {
            stats.drop_date += 1;
            return Ok(Step::Continue);
        }

        let amount = match record.amount.as_deref().map(Decimal::from_str_canonical) {
            Some(Ok(amount)) => amount,
            _ => {
                warn!(fund = %fund.key, op_id = record.op_id(), amount = ?record.amount, "Unparseable amount, skipping");
                stats.drop_malformed += 1;
                return Ok(Step::Continue);
            }
        };
        if amount < options.min_amount {
            stats.drop_min_amount += 1;
            return Ok(Step::Continue);
        }

        let directory = &self.context.directory;
        let from = Address::new(record.from.clone().unwrap_or_default());
        let to = Address::new(record.to.clone().unwrap_or_default());
        let roles = Roles::resolve(directory, &from, &to);

        if !options.role_filter.scope_allows(&roles) {
            stats.drop_scope += 1;
            debug!(fund = %fund.key, from = %from, to = %to, "Dropped by counterparty scope");
            return Ok(Step::Continue);
        }
        let Some(section) = options.role_filter.section(&fund.address, &from, &to, &roles) else {
            stats.drop_role += 1;
            return Ok(Step::Continue);
        };

        let Some(tx_hash) = record.tx_hash() else {
            stats.drop_no_tx_hash += 1;
            return Ok(Step::Continue);
        };
        let key = TransferKey::new(tx_hash, record.op_id());
        if pass.seen.contains(&key) {
            stats.drop_duplicate += 1;
            return Ok(Step::Continue);
        }
        if state.existing_keys.contains(&key) {
            stats.dedup_skipped += 1;
            return Ok(Step::Continue);
        }
        pass.seen.insert(key.clone());
        state.existing_keys.insert(key.clone());

        let asset_code = record.asset_code_or_type().to_string();
        let asset_issuer = record.asset_issuer.clone().unwrap_or_default();
        let code_norm = normalize_token_part(&asset_code);
        let issuer_norm = normalize_token_part(&asset_issuer);
        let asset_key_norm = format!("{}:{}", code_norm, issuer_norm);

        if !options.asset_allowlist.is_empty() && !options.asset_allowlist.contains(&asset_key_norm)
        {
            stats.drop_asset_filter += 1;
            return Ok(Step::Continue);
        }
        if options.asset_blocklist.contains(&asset_key_norm) {
            stats.drop_asset_filter += 1;
            return Ok(Step::Continue);
        }
        if !options.token_filter.matches(&code_norm, &issuer_norm) {
            stats.drop_token_filter += 1;
            debug!(
                fund = %fund.key,
                asset = %asset_key_norm,
                filter = %options.token_filter.norm,
                mode = options.token_filter.mode(),
                "Dropped by token filter"
            );
            return Ok(Step::Continue);
        }

        let memo = match self.repo.get_cached_memo(tx_hash, now.timestamp()).await? {
            Some(memo) => {
                stats.memo_cache_hits += 1;
                memo
            }
            None => {
                if pass.queued_memos.insert(tx_hash.to_string()) {
                    batch.memo_hashes.push(tx_hash.to_string());
                    stats.memo_queued += 1;
                }
                String::new()
            }
        };

        let transfer = Transfer {
            from: from.clone(),
            to: to.clone(),
            asset_issuer: Address::new(asset_issuer.clone()),
            asset_code: asset_code.clone(),
            memo: Some(memo.clone()),
            direction: section,
            counterparty_type: counterparty_type(directory, section, &from, &to),
            class_override: None,
        };

        let mapping = self.context.mapper.map(&transfer, &self.context.indexes);
        let classification = self.context.classifier.classify(&transfer);

        match mapping.project_id() {
            UNMAPPED_PROJECT => stats.unmapped += 1,
            AMBIGUOUS_PROJECT => stats.ambiguous += 1,
            _ => {}
        }
        if classification.is_classified() {
            *stats
                .classified
                .entry(classification.class.clone())
                .or_default() += 1;
        }
        if let Some(anomaly) = mapping.anomaly() {
            if state.anomaly_keys.should_record(tx_hash, anomaly.reason) {
                batch
                    .anomalies
                    .push(AnomalyRecord::new(tx_hash, anomaly, Utc::now()));
            }
        }

        let row = LedgerRow {
            direction: section,
            created_at,
            from_label: directory.label(&from),
            from,
            to_label: directory.label(&to),
            to,
            asset_code: asset_code.clone(),
            asset_issuer: transfer.asset_issuer.clone(),
            asset_key: format!("{}:{}", asset_code, asset_issuer),
            amount,
            memo,
            tx_hash: tx_hash.to_string(),
            fund_key: fund.key.clone(),
            op_id: key.op_id,
            counterparty_type: transfer.counterparty_type,
            project_id: mapping.project_id().to_string(),
            mapping_method: Some(mapping.mapping_method()),
            class: classification.class,
            class_reason: Some(classification.class_reason),
            class_override: None,
            project_override: None,
            tags: options.fund_tags.get(&fund.key).cloned().unwrap_or_default(),
        };
        batch
            .balance_changes
            .push(BalanceChange::from_row(&fund.address, &row));
        batch.rows.push(row);

        Ok(Step::Continue)
    }
}
