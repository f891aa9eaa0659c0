//! Address → project indexes derived from the reference tables.

use crate::domain::{Address, ProjectId, ProjectTable, TrackedCounterparty};
use std::collections::{BTreeSet, HashMap};

/// Lookup tables consumed by the project mapper. Rebuilt on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceIndexes {
    pub account_to_project_ids: HashMap<Address, Vec<ProjectId>>,
    pub issuer_to_project_ids: HashMap<Address, Vec<ProjectId>>,
    pub active_project_ids: BTreeSet<ProjectId>,
}

impl ReferenceIndexes {
    /// Invert the project table and keep only addresses that belong to a
    /// tracked counterparty.
    pub fn build(projects: &ProjectTable, counterparties: &[TrackedCounterparty]) -> Self {
        let mut by_account: HashMap<&Address, Vec<&ProjectId>> = HashMap::new();
        let mut by_issuer: HashMap<&Address, Vec<&ProjectId>> = HashMap::new();
        let mut active_project_ids = BTreeSet::new();

        // ProjectTable iterates in id order, so candidate lists come out sorted.
        for record in projects.iter() {
            active_project_ids.insert(record.project_id.clone());
            if let Some(account) = record.account.as_ref().filter(|a| !a.is_empty()) {
                by_account.entry(account).or_default().push(&record.project_id);
            }
            if let Some(issuer) = record.issuer.as_ref().filter(|a| !a.is_empty()) {
                by_issuer.entry(issuer).or_default().push(&record.project_id);
            }
        }

        let mut account_to_project_ids: HashMap<Address, Vec<ProjectId>> = HashMap::new();
        let mut issuer_to_project_ids: HashMap<Address, Vec<ProjectId>> = HashMap::new();

        for cp in counterparties {
            for account in &cp.accounts {
                if let Some(ids) = by_account.get(account) {
                    merge_unique(account_to_project_ids.entry(account.clone()).or_default(), ids);
                }
            }
            for issuer in &cp.issuers {
                if let Some(ids) = by_issuer.get(issuer) {
                    merge_unique(issuer_to_project_ids.entry(issuer.clone()).or_default(), ids);
                }
            }
        }

        Self {
            account_to_project_ids,
            issuer_to_project_ids,
            active_project_ids,
        }
    }

    pub fn projects_for_account(&self, account: &Address) -> &[ProjectId] {
        self.account_to_project_ids
            .get(account)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn projects_for_issuer(&self, issuer: &Address) -> &[ProjectId] {
        self.issuer_to_project_ids
            .get(issuer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_active_project(&self, project_id: &str) -> bool {
        self.active_project_ids
            .contains(&ProjectId::new(project_id))
    }
}

fn merge_unique(target: &mut Vec<ProjectId>, ids: &[&ProjectId]) {
    for id in ids {
        if !target.contains(id) {
            target.push((*id).clone());
        }
    }
}
