//! Run-scoped dedup of anomaly records by `(tx_hash, reason)`.

use crate::domain::AnomalyReason;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct AnomalyKeySet {
    keys: HashSet<String>,
}

impl AnomalyKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from keys already in the store (`"{tx_hash}:{reason}"`).
    pub fn from_keys(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn key(tx_hash: &str, reason: AnomalyReason) -> String {
        format!("{}:{}", tx_hash, reason.as_str())
    }

    /// Returns true the first time a pair is seen and remembers it.
    pub fn should_record(&mut self, tx_hash: &str, reason: AnomalyReason) -> bool {
        self.keys.insert(Self::key(tx_hash, reason))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
