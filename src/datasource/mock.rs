//! Mock ledger client for testing without network calls.

use super::{LedgerClient, LedgerClientError, PaymentsPage};
use crate::domain::RawPayment;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Ledger client serving predefined payments and memos.
#[derive(Debug, Clone, Default)]
pub struct MockLedgerClient {
    payments: HashMap<String, Vec<RawPayment>>,
    memos: HashMap<String, String>,
    failing_accounts: HashSet<String>,
    failing_memos: HashSet<String>,
    memo_requests: Arc<Mutex<Vec<String>>>,
}

impl MockLedgerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a payment to an account's history; records are served in insertion order.
    pub fn with_payment(mut self, account: &str, payment: RawPayment) -> Self {
        self.payments
            .entry(account.to_string())
            .or_default()
            .push(payment);
        self
    }

    pub fn with_payments(mut self, account: &str, payments: Vec<RawPayment>) -> Self {
        self.payments
            .entry(account.to_string())
            .or_default()
            .extend(payments);
        self
    }

    pub fn with_memo(mut self, tx_hash: &str, memo: &str) -> Self {
        self.memos.insert(tx_hash.to_string(), memo.to_string());
        self
    }

    /// Make every payments request for `account` fail.
    pub fn with_failing_account(mut self, account: &str) -> Self {
        self.failing_accounts.insert(account.to_string());
        self
    }

    /// Make memo requests for `tx_hash` fail.
    pub fn with_failing_memo(mut self, tx_hash: &str) -> Self {
        self.failing_memos.insert(tx_hash.to_string());
        self
    }

    /// Hashes passed to `fetch_transaction_memo`, in call order.
    pub fn memo_requests(&self) -> Vec<String> {
        self.memo_requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn fetch_payments_page(
        &self,
        account: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<PaymentsPage, LedgerClientError> {
        if self.failing_accounts.contains(account) {
            return Err(LedgerClientError::HttpError {
                status: 503,
                message: "Service unavailable".to_string(),
            });
        }

        let all = self.payments.get(account).map(Vec::as_slice).unwrap_or(&[]);
        let start = match cursor {
            Some(c) => all
                .iter()
                .position(|p| p.paging_token == c)
                .map(|i| i + 1)
                .unwrap_or(all.len()),
            None => 0,
        };
        let records: Vec<RawPayment> = all[start..].iter().take(limit as usize).cloned().collect();
        let next_cursor = if start + records.len() < all.len() {
            records.last().map(|r| r.paging_token.clone())
        } else {
            None
        };

        Ok(PaymentsPage {
            records,
            next_cursor,
        })
    }

    async fn fetch_transaction_memo(&self, tx_hash: &str) -> Result<String, LedgerClientError> {
        if let Ok(mut requests) = self.memo_requests.lock() {
            requests.push(tx_hash.to_string());
        }
        if self.failing_memos.contains(tx_hash) {
            return Err(LedgerClientError::NetworkError("connection reset".to_string()));
        }
        Ok(self.memos.get(tx_hash).cloned().unwrap_or_default())
    }
}
