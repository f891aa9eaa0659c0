//! Mapping anomaly records.

use crate::domain::{Address, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a transfer could not be mapped to a single project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnomalyReason {
    Ambiguous,
    Unmapped,
}

impl AnomalyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyReason::Ambiguous => "AMBIGUOUS",
            AnomalyReason::Unmapped => "UNMAPPED",
        }
    }
}

impl std::fmt::Display for AnomalyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence collected while mapping failed or was ambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
    pub reason: AnomalyReason,
    pub matched_accounts: Vec<Address>,
    pub matched_issuers: Vec<Address>,
    pub memo: String,
    pub candidates: Vec<ProjectId>,
}

impl Anomaly {
    pub fn ambiguous_accounts(
        matched_accounts: Vec<Address>,
        memo: &str,
        candidates: Vec<ProjectId>,
    ) -> Self {
        Anomaly {
            reason: AnomalyReason::Ambiguous,
            matched_accounts,
            matched_issuers: Vec::new(),
            memo: memo.to_string(),
            candidates,
        }
    }

    pub fn ambiguous_issuer(issuer: Address, memo: &str, candidates: Vec<ProjectId>) -> Self {
        Anomaly {
            reason: AnomalyReason::Ambiguous,
            matched_accounts: Vec::new(),
            matched_issuers: vec![issuer],
            memo: memo.to_string(),
            candidates,
        }
    }

    pub fn unmapped(memo: &str) -> Self {
        Anomaly {
            reason: AnomalyReason::Unmapped,
            matched_accounts: Vec::new(),
            matched_issuers: Vec::new(),
            memo: memo.to_string(),
            candidates: Vec::new(),
        }
    }
}

/// Persisted anomaly row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnomalyRecord {
    pub recorded_at: DateTime<Utc>,
    pub tx_hash: String,
    pub issue_type: AnomalyReason,
    /// JSON-serialized [`Anomaly`].
    pub details: String,
    /// Candidate project ids joined with `", "`.
    pub suggested_project_ids: String,
}

impl AnomalyRecord {
    pub fn new(tx_hash: &str, anomaly: &Anomaly, recorded_at: DateTime<Utc>) -> Self {
        let details = serde_json::to_string(anomaly).unwrap_or_default();
        let suggested_project_ids = anomaly
            .candidates
            .iter()
            .map(ProjectId::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        AnomalyRecord {
            recorded_at,
            tx_hash: tx_hash.to_string(),
            issue_type: anomaly.reason,
            details,
            suggested_project_ids,
        }
    }
}
