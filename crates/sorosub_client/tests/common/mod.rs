#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    str::FromStr,
    sync::Mutex,
};

use serde_json::{json, Value};
use sorosub_client::{
    error::{ClientError, Result},
    horizon::HorizonTransport,
    rpc::RpcTransport,
    NetworkConfig,
};
use stellar_xdr::curr::{
    AccountEntry, AccountEntryExt, AccountId, ExtensionPoint, HostFunction, LedgerEntryData,
    LedgerFootprint, Limits, OperationBody, ReadXdr, ScVal, SequenceNumber, SorobanResources,
    SorobanTransactionData, SorobanTransactionMeta, SorobanTransactionMetaExt, Thresholds,
    TransactionEnvelope, TransactionMeta, TransactionMetaV3, WriteXdr,
};

pub const USER: &str = "GDFYJUIWYT63JQW4YCIMJTHOTHRE4W4OAUUO6JZB3PDGCQZBQGUAOJHX";
pub const MERCHANT: &str = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF";

/// Simulation diagnostic for a contract panic in a release build
pub const VM_TRAP: &str = "HostError: Error(WasmVm, InvalidAction)\n\nEvent log (newest first):\n   \
    0: [Diagnostic Event] contract:CDLZ..., topics:[error, Error(WasmVm, InvalidAction)], \
    data:\"escalating error to VM trap from failed host function call: fail_with_error\"";

#[derive(Clone)]
pub enum Reply {
    Ok(Value),
    RpcError(i64, String),
}

/// In-memory `RpcTransport` answering from per-method queues
///
/// The last reply queued for a method repeats once the queue drains.
#[derive(Default)]
pub struct ScriptedRpc {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, method: &str, value: Value) -> Self {
        self.push(method, Reply::Ok(value));
        self
    }

    pub fn error(self, method: &str, code: i64, message: &str) -> Self {
        self.push(method, Reply::RpcError(code, message.to_string()));
        self
    }

    pub fn push(&self, method: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

impl RpcTransport for ScriptedRpc {
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let routed = invoked_function(&params).map(|f| format!("{method}:{f}"));
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            let key = match routed {
                Some(key) if replies.contains_key(&key) => key,
                _ => method.to_string(),
            };
            match replies.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        match reply {
            Some(Reply::Ok(value)) => Ok(value),
            Some(Reply::RpcError(code, message)) => Err(ClientError::Rpc { code, message }),
            None => panic!("unscripted rpc method {method}"),
        }
    }
}

/// Contract function named by the envelope in `params.transaction`
pub fn invoked_function(params: &Value) -> Option<String> {
    let xdr = params.get("transaction")?.as_str()?;
    let envelope = TransactionEnvelope::from_xdr_base64(xdr, Limits::none()).ok()?;
    let TransactionEnvelope::Tx(v1) = envelope else {
        return None;
    };
    v1.tx.operations.iter().find_map(|op| match &op.body {
        OperationBody::InvokeHostFunction(invoke) => match &invoke.host_function {
            HostFunction::InvokeContract(args) => {
                Some(args.function_name.0.to_utf8_string_lossy())
            }
            _ => None,
        },
        _ => None,
    })
}

/// Arguments of the single contract call in an envelope
pub fn invoked_args(xdr: &str) -> Vec<ScVal> {
    let envelope = TransactionEnvelope::from_xdr_base64(xdr, Limits::none()).unwrap();
    let TransactionEnvelope::Tx(v1) = envelope else {
        panic!("expected v1 envelope");
    };
    match &v1.tx.operations[0].body {
        OperationBody::InvokeHostFunction(invoke) => match &invoke.host_function {
            HostFunction::InvokeContract(args) => args.args.to_vec(),
            _ => panic!("expected contract call"),
        },
        _ => panic!("expected host function"),
    }
}

/// `getLedgerEntries` result holding one account entry
pub fn account_entries(account_id: &str, sequence: i64) -> Value {
    let entry = LedgerEntryData::Account(AccountEntry {
        account_id: AccountId::from_str(account_id).unwrap(),
        balance: 100_000_000,
        seq_num: SequenceNumber(sequence),
        num_sub_entries: 0,
        inflation_dest: None,
        flags: 0,
        home_domain: Default::default(),
        thresholds: Thresholds([1, 0, 0, 0]),
        signers: Default::default(),
        ext: AccountEntryExt::V0,
    });
    json!({
        "entries": [{
            "key": "",
            "xdr": entry.to_xdr_base64(Limits::none()).unwrap(),
            "lastModifiedLedgerSeq": 10
        }],
        "latestLedger": 100
    })
}

pub fn no_entries() -> Value {
    json!({ "entries": [], "latestLedger": 100 })
}

pub fn transaction_data(resource_fee: i64) -> SorobanTransactionData {
    SorobanTransactionData {
        ext: ExtensionPoint::V0,
        resources: SorobanResources {
            footprint: LedgerFootprint {
                read_only: Default::default(),
                read_write: Default::default(),
            },
            instructions: 2_000_000,
            read_bytes: 1_000,
            write_bytes: 500,
        },
        resource_fee,
    }
}

/// Successful `simulateTransaction` result returning `retval`
pub fn simulated(retval: &ScVal, min_resource_fee: i64) -> Value {
    json!({
        "transactionData": transaction_data(min_resource_fee)
            .to_xdr_base64(Limits::none())
            .unwrap(),
        "minResourceFee": min_resource_fee.to_string(),
        "results": [{
            "auth": [],
            "xdr": retval.to_xdr_base64(Limits::none()).unwrap()
        }],
        "latestLedger": 100
    })
}

pub fn simulation_error(message: &str) -> Value {
    json!({ "error": message, "latestLedger": 100 })
}

pub fn sent(status: &str, hash: &str) -> Value {
    json!({ "status": status, "hash": hash, "latestLedger": 100 })
}

pub fn not_found() -> Value {
    json!({ "status": "NOT_FOUND", "latestLedger": 100 })
}

/// Terminal `getTransaction` result with `retval` in the result meta
pub fn finished(status: &str, retval: ScVal) -> Value {
    let meta = TransactionMeta::V3(TransactionMetaV3 {
        ext: ExtensionPoint::V0,
        tx_changes_before: Default::default(),
        operations: Default::default(),
        tx_changes_after: Default::default(),
        soroban_meta: Some(SorobanTransactionMeta {
            ext: SorobanTransactionMetaExt::V0,
            events: Default::default(),
            return_value: retval,
            diagnostic_events: Default::default(),
        }),
    });
    json!({
        "status": status,
        "ledger": 101,
        "latestLedger": 101,
        "resultMetaXdr": meta.to_xdr_base64(Limits::none()).unwrap()
    })
}

pub fn latest_ledger(sequence: u32) -> Value {
    json!({ "id": "abc", "protocolVersion": 21, "sequence": sequence })
}

pub fn config() -> NetworkConfig {
    NetworkConfig {
        known_providers: vec![MERCHANT.to_string()],
        ..NetworkConfig::testnet()
    }
}

// ============================================
// HORIZON
// ============================================

#[derive(Clone)]
pub enum Page {
    Found(Value),
    Missing,
    Down,
}

/// In-memory `HorizonTransport`; unknown paths are 404
#[derive(Default)]
pub struct FakeHorizon {
    pages: HashMap<String, Page>,
}

impl FakeHorizon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, path: &str, page: Page) -> Self {
        self.pages.insert(path.to_string(), page);
        self
    }

    /// Account with `sequence`, `native` XLM, and `payments` payment records
    /// among `transactions` transactions
    pub fn account(
        account_id: &str,
        sequence: i64,
        native: &str,
        payments: usize,
        transactions: usize,
    ) -> Self {
        let payment_records: Vec<Value> = (0..payments)
            .map(|i| json!({"id": i.to_string(), "type": "payment"}))
            .chain(std::iter::once(json!({"id": "x", "type": "create_account"})))
            .collect();
        let transaction_records: Vec<Value> = (0..transactions)
            .map(|i| json!({"id": i.to_string()}))
            .collect();

        Self::new()
            .page(
                &format!("/accounts/{account_id}"),
                Page::Found(json!({
                    "id": account_id,
                    "account_id": account_id,
                    "sequence": sequence.to_string(),
                    "balances": [{"asset_type": "native", "balance": native}]
                })),
            )
            .page(
                &format!("/accounts/{account_id}/payments?limit=100&order=desc"),
                Page::Found(json!({"_embedded": {"records": payment_records}})),
            )
            .page(
                &format!("/accounts/{account_id}/transactions?limit=100&order=desc"),
                Page::Found(json!({"_embedded": {"records": transaction_records}})),
            )
    }
}

impl HorizonTransport for FakeHorizon {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        match self.pages.get(path).cloned().unwrap_or(Page::Missing) {
            Page::Found(value) => Ok(Some(value)),
            Page::Missing => Ok(None),
            Page::Down => Err(ClientError::Horizon(format!("503 for {path}"))),
        }
    }
}
