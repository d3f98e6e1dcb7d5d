use std::str::FromStr;

use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    DecoratedSignature, Hash, HostFunction, InvokeContractArgs, InvokeHostFunctionOp, Limits,
    Memo, MuxedAccount, Operation, OperationBody, Preconditions, ReadXdr, ScVal, SequenceNumber,
    TimeBounds, TimePoint, Transaction, TransactionEnvelope, TransactionExt,
    TransactionSignaturePayload, TransactionSignaturePayloadTaggedTransaction,
    TransactionV1Envelope, WriteXdr,
};

use crate::error::{ClientError, Result};
use crate::rpc::{AccountState, Simulation};
use crate::scval::{parse_address, symbol};

/// One contract call: target, function and positional arguments
#[derive(Clone, Debug)]
pub struct Invocation {
    pub contract_id: String,
    pub function: &'static str,
    pub args: Vec<ScVal>,
}

/// Fee and validity window for an envelope
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxParams {
    pub base_fee: u32,
    pub timeout_secs: u64,
}

/// Build an unsigned single-operation transaction
///
/// Sequence is `source.sequence + 1`; time bounds are `[0, now + timeout]`.
pub fn build_invoke_transaction(
    source: &AccountState,
    invocation: &Invocation,
    params: TxParams,
    now: u64,
) -> Result<Transaction> {
    let source_account = MuxedAccount::from_str(&source.account_id)
        .map_err(|_| ClientError::InvalidAddress(source.account_id.clone()))?;
    let sequence = source
        .sequence
        .checked_add(1)
        .ok_or_else(|| ClientError::Decode("account sequence overflow".into()))?;

    let operation = Operation {
        source_account: None,
        body: OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
            host_function: HostFunction::InvokeContract(InvokeContractArgs {
                contract_address: parse_address(&invocation.contract_id)?,
                function_name: symbol(invocation.function)?,
                args: invocation.args.clone().try_into()?,
            }),
            auth: Default::default(),
        }),
    };

    Ok(Transaction {
        source_account,
        fee: params.base_fee,
        seq_num: SequenceNumber(sequence),
        cond: Preconditions::Time(TimeBounds {
            min_time: TimePoint(0),
            max_time: TimePoint(now.saturating_add(params.timeout_secs)),
        }),
        memo: Memo::None,
        operations: vec![operation].try_into()?,
        ext: TransactionExt::V0,
    })
}

/// Apply a simulation: soroban data, auth entries, and the resource fee on
/// top of the base fee
///
/// # Errors
/// - `Simulation`: resulting fee does not fit in `u32`
pub fn assemble(mut tx: Transaction, simulation: &Simulation) -> Result<Transaction> {
    let fee = i64::from(tx.fee)
        .checked_add(simulation.min_resource_fee)
        .and_then(|fee| u32::try_from(fee).ok())
        .ok_or_else(|| {
            ClientError::Simulation(format!(
                "resource fee {} out of range",
                simulation.min_resource_fee
            ))
        })?;
    tx.fee = fee;
    tx.ext = TransactionExt::V1(simulation.transaction_data.clone());

    let mut operations = tx.operations.to_vec();
    for op in operations.iter_mut() {
        if let OperationBody::InvokeHostFunction(invoke) = &mut op.body {
            if invoke.auth.is_empty() {
                invoke.auth = simulation.auth.clone().try_into()?;
            }
        }
    }
    tx.operations = operations.try_into()?;
    Ok(tx)
}

pub fn envelope(tx: Transaction) -> TransactionEnvelope {
    TransactionEnvelope::Tx(TransactionV1Envelope {
        tx,
        signatures: Default::default(),
    })
}

pub fn to_base64(envelope: &TransactionEnvelope) -> Result<String> {
    Ok(envelope.to_xdr_base64(Limits::none())?)
}

/// # Errors
/// - `Xdr`: not a valid base64 envelope
pub fn from_base64(xdr: &str) -> Result<TransactionEnvelope> {
    Ok(TransactionEnvelope::from_xdr_base64(xdr.trim(), Limits::none())?)
}

pub fn network_id(passphrase: &str) -> Hash {
    Hash(Sha256::digest(passphrase.as_bytes()).into())
}

/// SHA-256 of the signature payload; what gets signed and the transaction hash
pub fn transaction_hash(tx: &Transaction, passphrase: &str) -> Result<[u8; 32]> {
    let payload = TransactionSignaturePayload {
        network_id: network_id(passphrase),
        tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(tx.clone()),
    };
    let bytes = payload.to_xdr(Limits::none())?;
    Ok(Sha256::digest(bytes).into())
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Append a signature to a v1 envelope
///
/// # Errors
/// - `Decode`: envelope is not a v1 transaction envelope
pub fn add_signature(
    envelope: &mut TransactionEnvelope,
    signature: DecoratedSignature,
) -> Result<()> {
    let TransactionEnvelope::Tx(v1) = envelope else {
        return Err(ClientError::Decode("only v1 envelopes can be signed".into()));
    };
    let mut signatures = v1.signatures.to_vec();
    signatures.push(signature);
    v1.signatures = signatures.try_into()?;
    Ok(())
}
