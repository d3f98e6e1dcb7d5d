use std::{
    future::Future,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use stellar_xdr::curr::{
    AccountId, LedgerEntryData, LedgerKey, LedgerKeyAccount, Limits, ReadXdr, ScVal,
    SorobanAuthorizationEntry, SorobanTransactionData, TransactionMeta, WriteXdr,
};
use tracing::{debug, trace};

use crate::error::{ClientError, Result};

/// JSON-RPC 2.0 request/response seam in front of a Soroban RPC server
pub trait RpcTransport: Send + Sync {
    /// Invoke `method` and return the `result` member of the response
    fn call(&self, method: &str, params: Value) -> impl Future<Output = Result<Value>> + Send;
}

// ============================================
// HTTP TRANSPORT
// ============================================

pub struct HttpRpc {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpRpc {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl RpcTransport for HttpRpc {
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "rpc request");

        let response: JsonRpcResponse = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(ClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        response.result.ok_or_else(|| ClientError::Rpc {
            code: 0,
            message: format!("{method}: response has neither result nor error"),
        })
    }
}

// ============================================
// TYPED RESULTS
// ============================================

/// Account state needed to build a transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountState {
    pub account_id: String,
    /// Current sequence; the next transaction uses `sequence + 1`
    pub sequence: i64,
    /// Native balance in stroops
    pub balance: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestLedger {
    pub sequence: u32,
    #[serde(default)]
    pub protocol_version: u32,
    #[serde(default)]
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub passphrase: String,
    #[serde(default)]
    pub protocol_version: u32,
    #[serde(default)]
    pub friendbot_url: Option<String>,
}

/// Decoded `simulateTransaction` result
#[derive(Clone, Debug)]
pub struct Simulation {
    pub transaction_data: SorobanTransactionData,
    pub min_resource_fee: i64,
    pub auth: Vec<SorobanAuthorizationEntry>,
    /// Return value of the invoked contract function
    pub retval: ScVal,
    pub latest_ledger: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendStatus {
    Pending,
    Duplicate,
    TryAgainLater,
    Error,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub status: SendStatus,
    pub hash: String,
    #[serde(default)]
    pub error_result_xdr: Option<String>,
    #[serde(default)]
    pub latest_ledger: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    NotFound,
    Failed,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub status: TransactionStatus,
    #[serde(default)]
    pub ledger: Option<u32>,
    #[serde(default)]
    pub latest_ledger: u32,
    #[serde(default)]
    pub result_xdr: Option<String>,
    #[serde(default)]
    pub result_meta_xdr: Option<String>,
}

impl TransactionInfo {
    /// Contract return value from the result meta, when present
    pub fn return_value(&self) -> Option<ScVal> {
        let meta = self.result_meta_xdr.as_deref()?;
        match TransactionMeta::from_xdr_base64(meta, Limits::none()).ok()? {
            TransactionMeta::V3(v3) => v3.soroban_meta.map(|m| m.return_value),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerEntriesWire {
    #[serde(default)]
    entries: Option<Vec<LedgerEntryWire>>,
}

#[derive(Deserialize)]
struct LedgerEntryWire {
    xdr: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulationWire {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    transaction_data: Option<String>,
    #[serde(default)]
    min_resource_fee: Option<Value>,
    #[serde(default)]
    results: Option<Vec<SimulatedCallWire>>,
    #[serde(default)]
    latest_ledger: u32,
}

#[derive(Deserialize)]
struct SimulatedCallWire {
    #[serde(default)]
    auth: Vec<String>,
    xdr: String,
}

// ============================================
// SOROBAN RPC CLIENT
// ============================================

/// Typed Soroban RPC calls over any [`RpcTransport`]
pub struct SorobanRpc<T> {
    transport: T,
}

impl<T: RpcTransport> SorobanRpc<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn request<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        let value = self.transport.call(method, params).await?;
        trace!(method, response = %value, "rpc response");
        Ok(serde_json::from_value(value)?)
    }

    /// Sequence and balance of an account
    ///
    /// # Errors
    /// - `AccountNotFound`: no ledger entry (account not funded yet)
    /// - `InvalidAddress`: `account_id` is not a `G...` strkey
    pub async fn get_account(&self, account_id: &str) -> Result<AccountState> {
        let id = AccountId::from_str(account_id)
            .map_err(|_| ClientError::InvalidAddress(account_id.to_string()))?;
        let key = LedgerKey::Account(LedgerKeyAccount { account_id: id });
        let wire: LedgerEntriesWire = self
            .request(
                "getLedgerEntries",
                json!({ "keys": [key.to_xdr_base64(Limits::none())?] }),
            )
            .await?;

        let entry = wire
            .entries
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::AccountNotFound(account_id.to_string()))?;

        match LedgerEntryData::from_xdr_base64(&entry.xdr, Limits::none())? {
            LedgerEntryData::Account(account) => Ok(AccountState {
                account_id: account_id.to_string(),
                sequence: account.seq_num.0,
                balance: account.balance,
            }),
            _ => Err(ClientError::Decode(format!(
                "ledger entry for {account_id} is not an account"
            ))),
        }
    }

    pub async fn get_latest_ledger(&self) -> Result<LatestLedger> {
        self.request("getLatestLedger", Value::Null).await
    }

    pub async fn get_network(&self) -> Result<NetworkInfo> {
        self.request("getNetwork", Value::Null).await
    }

    /// Simulate a single-invocation transaction
    ///
    /// # Errors
    /// - `Simulation`: the server reported an error (including contract panics)
    /// - `Decode` / `Xdr`: response is missing data or malformed
    pub async fn simulate_transaction(&self, envelope_xdr: &str) -> Result<Simulation> {
        let wire: SimulationWire = self
            .request(
                "simulateTransaction",
                json!({ "transaction": envelope_xdr }),
            )
            .await?;

        if let Some(error) = wire.error {
            return Err(ClientError::Simulation(error));
        }

        let transaction_data = wire
            .transaction_data
            .ok_or_else(|| ClientError::Decode("simulation has no transactionData".into()))?;
        let transaction_data =
            SorobanTransactionData::from_xdr_base64(&transaction_data, Limits::none())?;

        let call = wire
            .results
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Decode("simulation has no results".into()))?;
        let retval = ScVal::from_xdr_base64(&call.xdr, Limits::none())?;
        let auth = call
            .auth
            .iter()
            .map(|entry| SorobanAuthorizationEntry::from_xdr_base64(entry, Limits::none()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Simulation {
            transaction_data,
            min_resource_fee: parse_fee(wire.min_resource_fee.as_ref())?,
            auth,
            retval,
            latest_ledger: wire.latest_ledger,
        })
    }

    pub async fn send_transaction(&self, envelope_xdr: &str) -> Result<SendResponse> {
        self.request("sendTransaction", json!({ "transaction": envelope_xdr }))
            .await
    }

    pub async fn get_transaction(&self, hash: &str) -> Result<TransactionInfo> {
        self.request("getTransaction", json!({ "hash": hash })).await
    }
}

/// `minResourceFee` arrives as a numeric string; older servers send a number
fn parse_fee(value: Option<&Value>) -> Result<i64> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| ClientError::Decode(format!("minResourceFee {s:?}"))),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| ClientError::Decode(format!("minResourceFee {n}"))),
        Some(other) => Err(ClientError::Decode(format!("minResourceFee {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fee_shapes() {
        assert_eq!(parse_fee(None).unwrap(), 0);
        assert_eq!(parse_fee(Some(&json!("58181"))).unwrap(), 58_181);
        assert_eq!(parse_fee(Some(&json!(12))).unwrap(), 12);
        assert!(parse_fee(Some(&json!("abc"))).is_err());
        assert!(parse_fee(Some(&json!([1]))).is_err());
    }

    #[test]
    fn test_status_wire_names() {
        let send: SendResponse =
            serde_json::from_value(json!({"status": "TRY_AGAIN_LATER", "hash": "ab"})).unwrap();
        assert_eq!(send.status, SendStatus::TryAgainLater);

        let info: TransactionInfo =
            serde_json::from_value(json!({"status": "NOT_FOUND", "latestLedger": 10})).unwrap();
        assert_eq!(info.status, TransactionStatus::NotFound);
        assert_eq!(info.return_value(), None);
    }
}
