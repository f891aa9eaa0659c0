//! Persisted transfer rows and balance changes.

use crate::domain::{
    Address, ClassReason, CounterpartyType, Decimal, Direction, MappingMethod, Transfer,
    TransferKey,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One classified, mapped transfer in the append-only ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub direction: Direction,
    pub created_at: DateTime<Utc>,
    pub from: Address,
    pub from_label: String,
    pub to: Address,
    pub to_label: String,
    pub asset_code: String,
    pub asset_issuer: Address,
    /// Raw `code:issuer` as received.
    pub asset_key: String,
    pub amount: Decimal,
    pub memo: String,
    pub tx_hash: String,
    pub fund_key: String,
    pub op_id: String,
    pub counterparty_type: CounterpartyType,
    pub project_id: String,
    pub mapping_method: Option<MappingMethod>,
    pub class: String,
    pub class_reason: Option<ClassReason>,
    pub class_override: Option<String>,
    pub project_override: Option<String>,
    pub tags: String,
}

impl LedgerRow {
    pub fn key(&self) -> TransferKey {
        TransferKey::new(self.tx_hash.clone(), self.op_id.clone())
    }

    /// Rebuild the engine view of this row for recomputation.
    pub fn to_transfer(&self) -> Transfer {
        Transfer {
            from: self.from.clone(),
            to: self.to.clone(),
            asset_issuer: self.asset_issuer.clone(),
            asset_code: self.asset_code.clone(),
            memo: Some(self.memo.clone()),
            direction: self.direction,
            counterparty_type: self.counterparty_type,
            class_override: self.class_override.clone(),
        }
    }

    pub fn has_class_override(&self) -> bool {
        self.class_override
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }

    pub fn has_project_override(&self) -> bool {
        self.project_override
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

/// A ledger row together with its storage id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTransfer {
    pub id: i64,
    pub row: LedgerRow,
}

/// Signed movement of one asset on a fund account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub fund_account: Address,
    pub asset_key: String,
    pub change_amount: Decimal,
    pub tx_hash: String,
    pub op_id: String,
    pub created_at: DateTime<Utc>,
}

impl BalanceChange {
    pub fn from_row(fund_account: &Address, row: &LedgerRow) -> Self {
        let change_amount = match row.direction {
            Direction::Out => -row.amount,
            _ => row.amount,
        };
        BalanceChange {
            fund_account: fund_account.clone(),
            asset_key: row.asset_key.clone(),
            change_amount,
            tx_hash: row.tx_hash.clone(),
            op_id: row.op_id.clone(),
            created_at: row.created_at,
        }
    }
}
