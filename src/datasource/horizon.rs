//! Horizon REST client.

use super::{LedgerClient, LedgerClientError, PaymentsPage};
use crate::domain::RawPayment;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_HORIZON_URL: &str = "https://horizon.stellar.org";

/// Ledger client backed by a Horizon server.
#[derive(Debug, Clone)]
pub struct HorizonClient {
    client: Client,
    base_url: String,
}

impl HorizonClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, LedgerClientError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(url)
                .query(query)
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(LedgerClientError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(LedgerClientError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(LedgerClientError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(LedgerClientError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response.json::<serde_json::Value>().await.map_err(|e| {
                backoff::Error::permanent(LedgerClientError::ParseError(e.to_string()))
            })
        })
        .await
    }
}

#[async_trait]
impl LedgerClient for HorizonClient {
    async fn fetch_payments_page(
        &self,
        account: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<PaymentsPage, LedgerClientError> {
        debug!(account, cursor, limit, "Fetching payments page");

        let url = format!("{}/accounts/{}/payments", self.base_url, account);
        let mut query = vec![("order", "asc".to_string()), ("limit", limit.to_string())];
        if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
            query.push(("cursor", cursor.to_string()));
        }

        let response = self.get_json(&url, &query).await?;
        parse_payments_page(&response, limit)
    }

    async fn fetch_transaction_memo(&self, tx_hash: &str) -> Result<String, LedgerClientError> {
        debug!(tx_hash, "Fetching transaction memo");

        let url = format!("{}/transactions/{}", self.base_url, tx_hash);
        let response = self.get_json(&url, &[]).await?;
        Ok(response
            .get("memo")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string())
    }
}

/// Parse a `/payments` response. Records that fail to decode are skipped.
fn parse_payments_page(
    response: &serde_json::Value,
    limit: u32,
) -> Result<PaymentsPage, LedgerClientError> {
    let records_json = response
        .pointer("/_embedded/records")
        .and_then(|v| v.as_array())
        .ok_or_else(|| LedgerClientError::ParseError("Missing _embedded.records".to_string()))?;

    let mut records = Vec::with_capacity(records_json.len());
    for record_json in records_json {
        match serde_json::from_value::<RawPayment>(record_json.clone()) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Failed to parse payment record: {}", e),
        }
    }

    // A short page means the end of the history has been reached.
    let next_cursor = if records_json.len() < limit as usize {
        None
    } else {
        records.last().map(|r| r.paging_token.clone())
    };

    Ok(PaymentsPage {
        records,
        next_cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(token: &str) -> serde_json::Value {
        serde_json::json!({
            "id": token,
            "paging_token": token,
            "type": "payment",
            "from": "GFROM",
            "to": "GTO",
            "asset_type": "credit_alphanum12",
            "asset_code": "EURMTL",
            "asset_issuer": "GISSUER",
            "amount": "10.0000000",
            "created_at": "2024-03-01T10:00:00Z",
            "transaction_hash": format!("tx{}", token),
        })
    }

    #[test]
    fn test_parse_full_page_has_next_cursor() {
        let body = serde_json::json!({
            "_embedded": { "records": [record("1"), record("2")] },
            "_links": { "next": { "href": "https://horizon/next" } }
        });
        let page = parse_payments_page(&body, 2).unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.next_cursor.as_deref(), Some("2"));
    }

    #[test]
    fn test_parse_short_page_ends_history() {
        let body = serde_json::json!({ "_embedded": { "records": [record("7")] } });
        let page = parse_payments_page(&body, 200).unwrap();
        assert_eq!(page.records[0].transaction_hash.as_deref(), Some("tx7"));
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let body = serde_json::json!({
            "_embedded": { "records": [record("1"), { "type": "payment" }] }
        });
        let page = parse_payments_page(&body, 200).unwrap();
        assert_eq!(page.records.len(), 1);
    }

    #[test]
    fn test_missing_embedded_is_parse_error() {
        let err = parse_payments_page(&serde_json::json!({ "status": 404 }), 200).unwrap_err();
        assert!(matches!(err, LedgerClientError::ParseError(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HorizonClient::new("https://horizon.example/");
        assert_eq!(client.base_url, "https://horizon.example");
    }
}
