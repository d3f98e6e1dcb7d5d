use std::{future::Future, str::FromStr, time::Duration};

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// Records fetched per history query
pub const HISTORY_LIMIT: u32 = 100;

/// Read-only REST seam in front of a Horizon server
pub trait HorizonTransport: Send + Sync {
    /// GET `path` (relative, with query string); `Ok(None)` on 404
    fn get(&self, path: &str) -> impl Future<Output = Result<Option<Value>>> + Send;
}

pub struct HttpHorizon {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHorizon {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl HorizonTransport for HttpHorizon {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "horizon request");

        let response = self.client.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(ClientError::Horizon(format!("{status} for {path}"))),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct HorizonAccount {
    pub id: String,
    /// Decimal string
    pub sequence: String,
    #[serde(default)]
    pub balances: Vec<HorizonBalance>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HorizonBalance {
    pub asset_type: String,
    pub balance: String,
    #[serde(default)]
    pub asset_code: Option<String>,
}

impl HorizonAccount {
    /// Zero when Horizon sends something that is not an integer
    pub fn sequence_number(&self) -> i64 {
        match self.sequence.parse() {
            Ok(sequence) => sequence,
            Err(e) => {
                warn!(
                    account = %self.id,
                    sequence = %self.sequence,
                    error = %e,
                    "malformed sequence, using zero"
                );
                0
            }
        }
    }

    /// Native (XLM) balance in display units; zero if absent
    pub fn native_balance(&self) -> Decimal {
        self.balances
            .iter()
            .find(|b| b.asset_type == "native")
            .and_then(|b| Decimal::from_str(&b.balance).ok())
            .unwrap_or(Decimal::ZERO)
    }
}

/// Operation or transaction record; only the fields scoring looks at
#[derive(Clone, Debug, Deserialize)]
pub struct HistoryRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Deserialize)]
struct Page<R> {
    #[serde(rename = "_embedded")]
    embedded: Embedded<R>,
}

#[derive(Deserialize)]
struct Embedded<R> {
    records: Vec<R>,
}

/// Typed Horizon queries over any [`HorizonTransport`]
pub struct Horizon<H> {
    transport: H,
}

impl Horizon<HttpHorizon> {
    pub fn from_url(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self::new(HttpHorizon::new(base_url, timeout)?))
    }
}

impl<H: HorizonTransport> Horizon<H> {
    pub fn new(transport: H) -> Self {
        Self { transport }
    }

    /// `None` when the account does not exist (not funded)
    pub async fn account(&self, account_id: &str) -> Result<Option<HorizonAccount>> {
        match self.transport.get(&format!("/accounts/{account_id}")).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Most recent payment-operation records, newest first
    pub async fn payments(&self, account_id: &str) -> Result<Vec<HistoryRecord>> {
        self.history(account_id, "payments").await
    }

    /// Most recent transactions, newest first
    pub async fn transactions(&self, account_id: &str) -> Result<Vec<HistoryRecord>> {
        self.history(account_id, "transactions").await
    }

    async fn history<R: DeserializeOwned>(&self, account_id: &str, kind: &str) -> Result<Vec<R>> {
        let path = format!("/accounts/{account_id}/{kind}?limit={HISTORY_LIMIT}&order=desc");
        match self.transport.get(&path).await? {
            Some(value) => {
                let page: Page<R> = serde_json::from_value(value)?;
                Ok(page.embedded.records)
            }
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_account_native_balance() {
        let account: HorizonAccount = serde_json::from_value(json!({
            "id": "GABC",
            "sequence": "4294967296",
            "balances": [
                {"asset_type": "credit_alphanum4", "asset_code": "USDC", "balance": "5.0000000"},
                {"asset_type": "native", "balance": "1234.5000000"}
            ]
        }))
        .unwrap();

        assert_eq!(account.sequence_number(), 4_294_967_296);
        assert_eq!(account.native_balance(), Decimal::from_str("1234.5").unwrap());
    }

    #[test]
    fn test_account_without_native_balance() {
        let account: HorizonAccount =
            serde_json::from_value(json!({"id": "GABC", "sequence": "x"})).unwrap();
        assert_eq!(account.sequence_number(), 0);
        assert_eq!(account.native_balance(), Decimal::ZERO);
    }

    #[test]
    fn test_malformed_sequence_scores_as_new_account() {
        for sequence in ["", "12.5", "99999999999999999999", "-"] {
            let account: HorizonAccount =
                serde_json::from_value(json!({"id": "GABC", "sequence": sequence})).unwrap();
            assert_eq!(account.sequence_number(), 0, "sequence {sequence:?}");
        }
    }

    #[test]
    fn test_page_records() {
        let page: Page<HistoryRecord> = serde_json::from_value(json!({
            "_links": {},
            "_embedded": {"records": [
                {"id": "1", "type": "payment"},
                {"id": "2", "type": "create_account"},
                {"id": "3"}
            ]}
        }))
        .unwrap();
        let kinds: Vec<_> = page.embedded.records.iter().map(|r| r.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![Some("payment".into()), Some("create_account".into()), None]
        );
    }
}
