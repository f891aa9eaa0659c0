//! Transfer view consumed by the project mapper and the classifier.

use crate::domain::{Address, CounterpartyType, Direction};
use serde::{Deserialize, Serialize};

/// A fund transfer as seen by the mapping and classification engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    pub asset_issuer: Address,
    pub asset_code: String,
    pub memo: Option<String>,
    pub direction: Direction,
    pub counterparty_type: CounterpartyType,
    pub class_override: Option<String>,
}

impl Transfer {
    /// Memo text, with a missing memo treated as empty.
    pub fn memo_text(&self) -> &str {
        self.memo.as_deref().unwrap_or("")
    }

    /// Override text if present and not blank.
    pub fn effective_override(&self) -> Option<&str> {
        self.class_override
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Append-only dedup key of a stored transfer: `(tx_hash, op_id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransferKey {
    pub tx_hash: String,
    pub op_id: String,
}

impl TransferKey {
    pub fn new(tx_hash: impl Into<String>, op_id: impl Into<String>) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            op_id: op_id.into(),
        }
    }
}

impl std::fmt::Display for TransferKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tx_hash, self.op_id)
    }
}
