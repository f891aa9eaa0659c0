//! Batch jobs over the ledger: sync, memo backfill and recomputation.

pub mod memos;
pub mod recompute;
pub mod sync;

pub use memos::{MemoBackfiller, MemoError, MemoOptions, MemoReport};
pub use recompute::{ReclassifyReport, RecomputeError, Recomputer, RemapReport};
pub use sync::{FundSyncStats, SyncError, SyncOptions, SyncReport, Syncer};

use crate::datasource::{load_account_labels, load_projects, load_residents, ReferenceError};
use crate::domain::{Address, Directory, FundAccount, ProjectTable, TrackedCounterparty};
use crate::engine::{
    ClassificationRules, MappingRules, ProjectMapper, ReferenceIndexes, TransferClassifier,
};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Reference data and engines shared by the sync and recompute jobs.
#[derive(Debug, Clone)]
pub struct ReferenceContext {
    pub directory: Directory,
    pub indexes: ReferenceIndexes,
    pub mapper: ProjectMapper,
    pub classifier: TransferClassifier,
}

impl ReferenceContext {
    pub fn new(
        funds: Vec<FundAccount>,
        projects: &ProjectTable,
        residents: &[TrackedCounterparty],
        account_labels: HashMap<Address, String>,
        mapping_rules: MappingRules,
        classification_rules: ClassificationRules,
    ) -> Self {
        Self {
            directory: Directory::new(funds, residents, account_labels),
            indexes: ReferenceIndexes::build(projects, residents),
            mapper: ProjectMapper::new(mapping_rules),
            classifier: TransferClassifier::new(classification_rules),
        }
    }

    /// Load the reference CSV files and build the context.
    pub fn load(
        funds: Vec<FundAccount>,
        projects_file: &Path,
        residents_file: &Path,
        accounts_file: Option<&Path>,
        mapping_rules: MappingRules,
        classification_rules: ClassificationRules,
    ) -> Result<Self, ReferenceError> {
        let projects = load_projects(projects_file)?;
        let residents = load_residents(residents_file)?;
        let account_labels = match accounts_file {
            Some(path) => load_account_labels(path)?,
            None => HashMap::new(),
        };

        let context = Self::new(
            funds,
            &projects,
            &residents,
            account_labels,
            mapping_rules,
            classification_rules,
        );
        info!(
            projects = projects.len(),
            residents = residents.len(),
            indexed_accounts = context.indexes.account_to_project_ids.len(),
            indexed_issuers = context.indexes.issuer_to_project_ids.len(),
            "Reference data loaded"
        );
        Ok(context)
    }
}
