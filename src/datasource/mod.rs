//! Ledger API abstraction and reference-table loading.

use crate::domain::RawPayment;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod horizon;
pub mod mock;
pub mod reference;

pub use horizon::HorizonClient;
pub use mock::MockLedgerClient;
pub use reference::{load_account_labels, load_projects, load_residents, ReferenceError};

/// One page of payment records in ascending ledger order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentsPage {
    pub records: Vec<RawPayment>,
    /// Cursor to continue from; `None` when there is nothing further.
    pub next_cursor: Option<String>,
}

/// Cursor-paginated access to an account's payment history.
///
/// Implementations must handle retry/backoff and rate limiting.
#[async_trait]
pub trait LedgerClient: Send + Sync + fmt::Debug {
    /// Fetch the page of payments for `account` strictly after `cursor`
    /// (from the beginning when `cursor` is `None`).
    async fn fetch_payments_page(
        &self,
        account: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<PaymentsPage, LedgerClientError>;

    /// Fetch a transaction's memo; a transaction without memo yields `""`.
    async fn fetch_transaction_memo(&self, tx_hash: &str) -> Result<String, LedgerClientError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerClientError {
    /// Connection timeout, DNS failure and the like.
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },
    /// Invalid JSON or a malformed response.
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Rate limited")]
    RateLimited,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_client_error_display() {
        let err = LedgerClientError::NetworkError("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = LedgerClientError::HttpError {
            status: 404,
            message: "Resource Missing".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 404: Resource Missing");

        assert_eq!(LedgerClientError::RateLimited.to_string(), "Rate limited");
    }
}
