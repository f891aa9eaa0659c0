//! Economic classification of transfers.

use crate::domain::{
    ClassReason, Classification, CounterpartyType, Direction, Transfer, CLASS_DIVIDEND,
    CLASS_FUNDING, CLASS_REPAYMENT,
};

pub const DEFAULT_REPAY_PATTERNS: &str = "repay|return|погаш|возврат|refund";
pub const DEFAULT_DIVIDEND_PATTERNS: &str = "dividend|дивиденд|profit|прибыль";
pub const DEFAULT_OPEX_PATTERNS: &str = "opex|опекс|fee|комиссия";

/// Injected classification rules. Patterns are stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRules {
    pub enabled: bool,
    pub repay_patterns: Vec<String>,
    pub dividend_patterns: Vec<String>,
    /// Loaded for completeness; not consulted by the decision tree.
    pub opex_patterns: Vec<String>,
}

impl ClassificationRules {
    /// Build rules from `|`-separated pattern lists.
    pub fn from_pipe_lists(enabled: bool, repay: &str, dividend: &str, opex: &str) -> Self {
        Self {
            enabled,
            repay_patterns: split_patterns(repay),
            dividend_patterns: split_patterns(dividend),
            opex_patterns: split_patterns(opex),
        }
    }
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self::from_pipe_lists(
            true,
            DEFAULT_REPAY_PATTERNS,
            DEFAULT_DIVIDEND_PATTERNS,
            DEFAULT_OPEX_PATTERNS,
        )
    }
}

fn split_patterns(raw: &str) -> Vec<String> {
    raw.split('|')
        .filter(|p| !p.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn memo_matches(memo_lower: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| memo_lower.contains(p.as_str()))
}

#[derive(Debug, Clone, Default)]
pub struct TransferClassifier {
    rules: ClassificationRules,
}

impl TransferClassifier {
    pub fn new(rules: ClassificationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ClassificationRules {
        &self.rules
    }

    /// Classify a transfer. Never fails; a manual override always wins.
    pub fn classify(&self, transfer: &Transfer) -> Classification {
        if let Some(class) = transfer.effective_override() {
            return Classification::new(class, ClassReason::Override);
        }

        if !self.rules.enabled {
            return Classification::new("", ClassReason::Disabled);
        }

        let is_resident = transfer.counterparty_type == CounterpartyType::Resident;
        match transfer.direction {
            Direction::Out if is_resident => {
                Classification::new(CLASS_FUNDING, ClassReason::OutToResident)
            }
            Direction::Out => Classification::new(CLASS_FUNDING, ClassReason::OutDefault),
            Direction::In if is_resident => {
                let memo = transfer.memo_text().to_lowercase();
                if memo_matches(&memo, &self.rules.repay_patterns) {
                    Classification::new(CLASS_REPAYMENT, ClassReason::InFromResidentRepayMemo)
                } else if memo_matches(&memo, &self.rules.dividend_patterns) {
                    Classification::new(CLASS_DIVIDEND, ClassReason::InFromResidentDividendMemo)
                } else {
                    Classification::new(CLASS_DIVIDEND, ClassReason::InFromResidentDefault)
                }
            }
            Direction::In => Classification::new(CLASS_DIVIDEND, ClassReason::InDefault),
            Direction::Unknown => Classification::new("", ClassReason::UnknownDirection),
        }
    }
}
