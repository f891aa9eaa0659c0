//! Project mapping cascade: account, then issuer, then memo.

use super::ReferenceIndexes;
use crate::domain::{Anomaly, MappingMethod, MappingResult, ProjectId, Transfer};
use regex::Regex;

/// Default memo pattern: optional `P` prefix and 3 to 6 digits.
pub const DEFAULT_PROJECT_ID_PATTERN: &str = r"\bP?[0-9]{3,6}\b";

/// Injected mapping rules.
#[derive(Debug, Clone)]
pub struct MappingRules {
    pub project_id_pattern: Regex,
}

impl MappingRules {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            project_id_pattern: Regex::new(pattern)?,
        })
    }
}

impl Default for MappingRules {
    fn default() -> Self {
        Self {
            project_id_pattern: Regex::new(DEFAULT_PROJECT_ID_PATTERN).expect("valid regex"),
        }
    }
}

/// Maps transfers to projects using the reference indexes.
#[derive(Debug, Clone, Default)]
pub struct ProjectMapper {
    rules: MappingRules,
}

impl ProjectMapper {
    pub fn new(rules: MappingRules) -> Self {
        Self { rules }
    }

    /// Map one transfer. Each step short-circuits once it finds candidates;
    /// ambiguity never falls through to weaker evidence.
    pub fn map(&self, transfer: &Transfer, indexes: &ReferenceIndexes) -> MappingResult {
        let memo = transfer.memo_text();

        let from_ids = indexes.projects_for_account(&transfer.from);
        let to_ids = indexes.projects_for_account(&transfer.to);
        let mut account_candidates: Vec<ProjectId> = Vec::new();
        for id in from_ids.iter().chain(to_ids.iter()) {
            if !account_candidates.contains(id) {
                account_candidates.push(id.clone());
            }
        }

        match account_candidates.len() {
            0 => {}
            1 => {
                return MappingResult::Mapped {
                    project_id: account_candidates.remove(0),
                    method: MappingMethod::ResidentsAccount,
                }
            }
            _ => {
                let matched_accounts = [&transfer.from, &transfer.to]
                    .into_iter()
                    .filter(|a| !indexes.projects_for_account(a).is_empty())
                    .cloned()
                    .collect();
                return MappingResult::Ambiguous(Anomaly::ambiguous_accounts(
                    matched_accounts,
                    memo,
                    account_candidates,
                ));
            }
        }

        let issuer_candidates = indexes.projects_for_issuer(&transfer.asset_issuer);
        match issuer_candidates {
            [] => {}
            [single] => {
                return MappingResult::Mapped {
                    project_id: single.clone(),
                    method: MappingMethod::ResidentsIssuer,
                }
            }
            many => {
                return MappingResult::Ambiguous(Anomaly::ambiguous_issuer(
                    transfer.asset_issuer.clone(),
                    memo,
                    many.to_vec(),
                ));
            }
        }

        if let Some(project_id) = self.project_id_from_memo(memo, indexes) {
            return MappingResult::Mapped {
                project_id,
                method: MappingMethod::MemoProjectId,
            };
        }

        MappingResult::Unmapped(Anomaly::unmapped(memo))
    }

    /// Only the first pattern match is considered.
    fn project_id_from_memo(&self, memo: &str, indexes: &ReferenceIndexes) -> Option<ProjectId> {
        let found = self.rules.project_id_pattern.find(memo)?.as_str();
        let id = found
            .strip_prefix('P')
            .or_else(|| found.strip_prefix('p'))
            .unwrap_or(found);
        indexes
            .is_active_project(id)
            .then(|| ProjectId::new(id))
    }
}
