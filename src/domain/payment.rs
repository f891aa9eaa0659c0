//! Raw payment records as returned by the ledger API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operation types that carry a value transfer between two accounts.
pub const PAYMENT_TYPES: [&str; 3] = [
    "payment",
    "path_payment_strict_send",
    "path_payment_strict_receive",
];

/// One record from the account payments stream.
///
/// The stream also yields non-payment operations (`create_account`,
/// `account_merge`), so everything besides the paging fields is optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawPayment {
    #[serde(default)]
    pub id: String,
    pub paging_token: String,
    #[serde(rename = "type", default)]
    pub op_type: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub asset_type: Option<String>,
    #[serde(default)]
    pub asset_code: Option<String>,
    #[serde(default)]
    pub asset_issuer: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

impl RawPayment {
    pub fn is_payment(&self) -> bool {
        PAYMENT_TYPES.contains(&self.op_type.as_str())
    }

    pub fn is_native(&self) -> bool {
        self.asset_type.as_deref() == Some("native")
    }

    /// Operation id, falling back to the paging token.
    pub fn op_id(&self) -> &str {
        if self.id.is_empty() {
            &self.paging_token
        } else {
            &self.id
        }
    }

    /// Asset code, or the asset type for native payments.
    pub fn asset_code_or_type(&self) -> &str {
        self.asset_code
            .as_deref()
            .filter(|c| !c.is_empty())
            .or(self.asset_type.as_deref())
            .unwrap_or("")
    }

    pub fn tx_hash(&self) -> Option<&str> {
        self.transaction_hash.as_deref().filter(|h| !h.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_horizon_payment() {
        let json = serde_json::json!({
            "id": "12345",
            "paging_token": "12345",
            "type": "payment",
            "created_at": "2024-03-01T10:00:00Z",
            "transaction_hash": "abc123",
            "asset_type": "credit_alphanum12",
            "asset_code": "EURMTL",
            "asset_issuer": "GISSUER",
            "from": "GFROM",
            "to": "GTO",
            "amount": "10.5000000"
        });

        let p: RawPayment = serde_json::from_value(json).unwrap();
        assert!(p.is_payment());
        assert!(!p.is_native());
        assert_eq!(p.op_id(), "12345");
        assert_eq!(p.asset_code_or_type(), "EURMTL");
        assert_eq!(p.tx_hash(), Some("abc123"));
    }

    #[test]
    fn test_deserialize_create_account_record() {
        let json = serde_json::json!({
            "id": "99",
            "paging_token": "99",
            "type": "create_account",
            "created_at": "2024-03-01T10:00:00Z",
            "transaction_hash": "def456",
            "account": "GNEW",
            "funder": "GFUND",
            "starting_balance": "5.0000000"
        });

        let p: RawPayment = serde_json::from_value(json).unwrap();
        assert!(!p.is_payment());
        assert!(p.from.is_none());
    }

    #[test]
    fn test_native_asset_code_falls_back_to_type() {
        let p = RawPayment {
            paging_token: "1".to_string(),
            op_type: "payment".to_string(),
            asset_type: Some("native".to_string()),
            ..Default::default()
        };
        assert!(p.is_native());
        assert_eq!(p.asset_code_or_type(), "native");
        assert_eq!(p.op_id(), "1");
    }
}
