//! Domain primitives: Address, ProjectId, Direction, CounterpartyType.

use serde::{Deserialize, Serialize};

/// Ledger account address (Stellar `G...` public key).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Create an Address from a string, trimming surrounding whitespace.
    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        let trimmed = addr.trim();
        if trimmed.len() == addr.len() {
            Address(addr)
        } else {
            Address(trimmed.to_string())
        }
    }

    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this looks like an account public key.
    pub fn is_account_key(&self) -> bool {
        self.0.starts_with('G')
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Internal project identifier (e.g. "123").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        ProjectId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transfer direction relative to the fund account being synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
    Unknown,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
            Direction::Unknown => "UNKNOWN",
        }
    }

    /// Parse a stored direction; anything unrecognised is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "IN" => Direction::In,
            "OUT" => Direction::Out,
            _ => Direction::Unknown,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is on the other side of a fund transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CounterpartyType {
    Resident,
    Fund,
    External,
    Unknown,
}

impl CounterpartyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterpartyType::Resident => "RESIDENT",
            CounterpartyType::Fund => "FUND",
            CounterpartyType::External => "EXTERNAL",
            CounterpartyType::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "RESIDENT" => CounterpartyType::Resident,
            "FUND" => CounterpartyType::Fund,
            "EXTERNAL" => CounterpartyType::External,
            _ => CounterpartyType::Unknown,
        }
    }
}

impl std::fmt::Display for CounterpartyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_trims_whitespace() {
        let addr = Address::new("  GABC \n");
        assert_eq!(addr.as_str(), "GABC");
        assert!(addr.is_account_key());
    }

    #[test]
    fn test_direction_parse_roundtrip() {
        assert_eq!(Direction::parse("IN"), Direction::In);
        assert_eq!(Direction::parse("OUT"), Direction::Out);
        assert_eq!(Direction::parse(""), Direction::Unknown);
        assert_eq!(Direction::parse("sideways"), Direction::Unknown);
        assert_eq!(Direction::Out.to_string(), "OUT");
    }

    #[test]
    fn test_counterparty_type_serialization() {
        let json = serde_json::to_string(&CounterpartyType::Resident).unwrap();
        assert_eq!(json, "\"RESIDENT\"");
        assert_eq!(CounterpartyType::parse("FUND"), CounterpartyType::Fund);
        assert_eq!(CounterpartyType::parse("?"), CounterpartyType::Unknown);
    }
}
