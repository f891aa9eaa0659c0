//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - Repository layer for the ledger, cursors, memos and run log

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::{ClassUpdate, CommitOutcome, FundBatch, ProjectUpdate, Repository, SyncLogEntry};
