pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use datasource::{HorizonClient, LedgerClient, LedgerClientError, MockLedgerClient};
pub use db::{init_db, Repository};
pub use domain::{Address, Decimal, Direction, LedgerRow, RawPayment, TransferKey};
pub use error::AppError;
pub use orchestration::{MemoBackfiller, Recomputer, ReferenceContext, Syncer};
