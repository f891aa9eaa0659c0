//! Project mapping and classification results.

use crate::domain::{Anomaly, AnomalyReason, ProjectId};
use serde::{Deserialize, Serialize};

pub const AMBIGUOUS_PROJECT: &str = "AMBIGUOUS";
pub const UNMAPPED_PROJECT: &str = "UNMAPPED";

/// How a project id was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingMethod {
    ResidentsAccount,
    ResidentsIssuer,
    MemoProjectId,
    Ambiguous,
    Unmapped,
}

impl MappingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingMethod::ResidentsAccount => "RESIDENTS_ACCOUNT",
            MappingMethod::ResidentsIssuer => "RESIDENTS_ISSUER",
            MappingMethod::MemoProjectId => "MEMO_PROJECT_ID",
            MappingMethod::Ambiguous => "AMBIGUOUS",
            MappingMethod::Unmapped => "UNMAPPED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "RESIDENTS_ACCOUNT" => Some(MappingMethod::ResidentsAccount),
            "RESIDENTS_ISSUER" => Some(MappingMethod::ResidentsIssuer),
            "MEMO_PROJECT_ID" => Some(MappingMethod::MemoProjectId),
            "AMBIGUOUS" => Some(MappingMethod::Ambiguous),
            "UNMAPPED" => Some(MappingMethod::Unmapped),
            _ => None,
        }
    }
}

impl std::fmt::Display for MappingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of mapping a transfer to a project.
///
/// A resolved mapping carries exactly one project and no anomaly; the two
/// failure shapes always carry their anomaly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingResult {
    Mapped {
        project_id: ProjectId,
        method: MappingMethod,
    },
    Ambiguous(Anomaly),
    Unmapped(Anomaly),
}

impl MappingResult {
    pub fn project_id(&self) -> &str {
        match self {
            MappingResult::Mapped { project_id, .. } => project_id.as_str(),
            MappingResult::Ambiguous(_) => AMBIGUOUS_PROJECT,
            MappingResult::Unmapped(_) => UNMAPPED_PROJECT,
        }
    }

    pub fn mapping_method(&self) -> MappingMethod {
        match self {
            MappingResult::Mapped { method, .. } => *method,
            MappingResult::Ambiguous(_) => MappingMethod::Ambiguous,
            MappingResult::Unmapped(_) => MappingMethod::Unmapped,
        }
    }

    pub fn candidates(&self) -> &[ProjectId] {
        match self {
            MappingResult::Mapped { project_id, .. } => std::slice::from_ref(project_id),
            MappingResult::Ambiguous(anomaly) | MappingResult::Unmapped(anomaly) => {
                &anomaly.candidates
            }
        }
    }

    pub fn anomaly(&self) -> Option<&Anomaly> {
        match self {
            MappingResult::Mapped { .. } => None,
            MappingResult::Ambiguous(anomaly) | MappingResult::Unmapped(anomaly) => Some(anomaly),
        }
    }

    pub fn anomaly_reason(&self) -> Option<AnomalyReason> {
        self.anomaly().map(|a| a.reason)
    }
}

/// Whether a stored project id still needs mapping.
pub fn is_unresolved_project(project_id: &str) -> bool {
    let p = project_id.trim();
    p.is_empty() || p == AMBIGUOUS_PROJECT || p == UNMAPPED_PROJECT
}

pub const CLASS_FUNDING: &str = "Funding";
pub const CLASS_DIVIDEND: &str = "Dividend";
pub const CLASS_REPAYMENT: &str = "Repayment";

/// Why a class was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassReason {
    Override,
    Disabled,
    OutToResident,
    OutDefault,
    InFromResidentRepayMemo,
    InFromResidentDividendMemo,
    InFromResidentDefault,
    InDefault,
    UnknownDirection,
}

impl ClassReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassReason::Override => "OVERRIDE",
            ClassReason::Disabled => "DISABLED",
            ClassReason::OutToResident => "OUT_TO_RESIDENT",
            ClassReason::OutDefault => "OUT_DEFAULT",
            ClassReason::InFromResidentRepayMemo => "IN_FROM_RESIDENT_REPAY_MEMO",
            ClassReason::InFromResidentDividendMemo => "IN_FROM_RESIDENT_DIVIDEND_MEMO",
            ClassReason::InFromResidentDefault => "IN_FROM_RESIDENT_DEFAULT",
            ClassReason::InDefault => "IN_DEFAULT",
            ClassReason::UnknownDirection => "UNKNOWN_DIRECTION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            ClassReason::Override,
            ClassReason::Disabled,
            ClassReason::OutToResident,
            ClassReason::OutDefault,
            ClassReason::InFromResidentRepayMemo,
            ClassReason::InFromResidentDividendMemo,
            ClassReason::InFromResidentDefault,
            ClassReason::InDefault,
            ClassReason::UnknownDirection,
        ]
        .into_iter()
        .find(|r| r.as_str() == s.trim())
    }
}

impl std::fmt::Display for ClassReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Economic class of a transfer. An empty class means "not classified".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub class: String,
    pub class_reason: ClassReason,
}

impl Classification {
    pub fn new(class: impl Into<String>, class_reason: ClassReason) -> Self {
        Classification {
            class: class.into(),
            class_reason,
        }
    }

    pub fn is_classified(&self) -> bool {
        !self.class.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapped_has_single_candidate_and_no_anomaly() {
        let result = MappingResult::Mapped {
            project_id: ProjectId::new("123"),
            method: MappingMethod::ResidentsAccount,
        };
        assert_eq!(result.project_id(), "123");
        assert_eq!(result.candidates(), &[ProjectId::new("123")]);
        assert!(result.anomaly().is_none());
    }

    #[test]
    fn test_unmapped_shape() {
        let result = MappingResult::Unmapped(Anomaly::unmapped(""));
        assert_eq!(result.project_id(), "UNMAPPED");
        assert_eq!(result.mapping_method(), MappingMethod::Unmapped);
        assert!(result.candidates().is_empty());
        assert_eq!(result.anomaly_reason(), Some(AnomalyReason::Unmapped));
    }

    #[test]
    fn test_is_unresolved_project() {
        assert!(is_unresolved_project(""));
        assert!(is_unresolved_project(" UNMAPPED "));
        assert!(is_unresolved_project("AMBIGUOUS"));
        assert!(!is_unresolved_project("123"));
    }

    #[test]
    fn test_class_reason_parse_roundtrip() {
        for reason in [
            ClassReason::Override,
            ClassReason::InFromResidentDividendMemo,
            ClassReason::UnknownDirection,
        ] {
            assert_eq!(ClassReason::parse(reason.as_str()), Some(reason));
        }
        assert_eq!(ClassReason::parse("NOPE"), None);
    }

    #[test]
    fn test_mapping_method_serialization() {
        let json = serde_json::to_string(&MappingMethod::MemoProjectId).unwrap();
        assert_eq!(json, "\"MEMO_PROJECT_ID\"");
        assert_eq!(
            MappingMethod::parse("RESIDENTS_ISSUER"),
            Some(MappingMethod::ResidentsIssuer)
        );
    }
}
