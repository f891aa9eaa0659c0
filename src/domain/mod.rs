//! Domain types for the fund transfer ledger.
//!
//! This module provides:
//! - Lossless amounts via the Decimal wrapper
//! - Primitives: Address, ProjectId, Direction, CounterpartyType
//! - Asset key normalization and the token filter
//! - Raw ledger payments and the Transfer view used by the engines
//! - Mapping/classification results, anomalies and persisted ledger rows
//! - Reference data (funds, tracked counterparties, projects)

pub mod anomaly;
pub mod asset;
pub mod decimal;
pub mod ledger_row;
pub mod mapping;
pub mod payment;
pub mod primitives;
pub mod reference;
pub mod transfer;

pub use anomaly::{Anomaly, AnomalyReason, AnomalyRecord};
pub use asset::{normalize_asset_key, normalize_token_part, TokenFilter};
pub use decimal::Decimal;
pub use ledger_row::{BalanceChange, LedgerRow, StoredTransfer};
pub use mapping::{
    is_unresolved_project, ClassReason, Classification, MappingMethod, MappingResult,
    AMBIGUOUS_PROJECT, CLASS_DIVIDEND, CLASS_FUNDING, CLASS_REPAYMENT, UNMAPPED_PROJECT,
};
pub use payment::{RawPayment, PAYMENT_TYPES};
pub use primitives::{Address, CounterpartyType, Direction, ProjectId};
pub use reference::{Directory, FundAccount, ProjectRecord, ProjectTable, TrackedCounterparty};
pub use transfer::{Transfer, TransferKey};
