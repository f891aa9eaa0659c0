//! Reference data: tracked fund accounts, counterparties, and the project table.

use crate::domain::{Address, ProjectId};
use std::collections::{BTreeMap, HashMap};

/// A fund account the sync follows, keyed by its configured name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundAccount {
    pub key: String,
    pub address: Address,
}

/// Project reference entry. Only active entries are kept in a [`ProjectTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    pub project_id: ProjectId,
    pub clickup_task_id: Option<String>,
    pub account: Option<Address>,
    pub issuer: Option<Address>,
    pub token_symbol: Option<String>,
}

/// Active projects by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectTable {
    projects: BTreeMap<ProjectId, ProjectRecord>,
}

impl ProjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record; a later record with the same id replaces the earlier one.
    pub fn insert(&mut self, record: ProjectRecord) {
        self.projects.insert(record.project_id.clone(), record);
    }

    /// Records in project id order.
    pub fn iter(&self) -> impl Iterator<Item = &ProjectRecord> {
        self.projects.values()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

impl FromIterator<ProjectRecord> for ProjectTable {
    fn from_iter<T: IntoIterator<Item = ProjectRecord>>(iter: T) -> Self {
        let mut table = ProjectTable::new();
        for record in iter {
            table.insert(record);
        }
        table
    }
}

/// A known counterparty (resident) with every address it operates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedCounterparty {
    pub label: String,
    pub accounts: Vec<Address>,
    pub issuers: Vec<Address>,
}

impl TrackedCounterparty {
    /// Parse a comma/semicolon separated address list, keeping account keys only.
    pub fn parse_addresses(raw: &str) -> Vec<Address> {
        raw.split([',', ';'])
            .map(Address::new)
            .filter(|a| a.is_account_key())
            .collect()
    }
}

/// Membership lookups over funds and residents.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    funds: Vec<FundAccount>,
    residents: HashMap<Address, String>,
    account_labels: HashMap<Address, String>,
}

impl Directory {
    pub fn new(
        funds: Vec<FundAccount>,
        counterparties: &[TrackedCounterparty],
        account_labels: HashMap<Address, String>,
    ) -> Self {
        let mut residents = HashMap::new();
        for cp in counterparties {
            if cp.label.trim().is_empty() {
                continue;
            }
            for addr in cp.accounts.iter().chain(cp.issuers.iter()) {
                residents.insert(addr.clone(), cp.label.trim().to_string());
            }
        }
        Self {
            funds,
            residents,
            account_labels,
        }
    }

    pub fn funds(&self) -> &[FundAccount] {
        &self.funds
    }

    pub fn is_fund(&self, addr: &Address) -> bool {
        self.funds.iter().any(|f| &f.address == addr)
    }

    pub fn is_resident(&self, addr: &Address) -> bool {
        self.residents.contains_key(addr)
    }

    pub fn resident_count(&self) -> usize {
        self.residents.len()
    }

    /// Display label: explicit account label, then fund key, then resident label.
    pub fn label(&self, addr: &Address) -> String {
        if let Some(label) = self.account_labels.get(addr) {
            return label.clone();
        }
        if let Some(fund) = self.funds.iter().find(|f| &f.address == addr) {
            return fund.key.clone();
        }
        self.residents.get(addr).cloned().unwrap_or_default()
    }
}
