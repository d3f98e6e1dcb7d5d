use std::time::Duration;

use stellar_xdr::curr::ScVal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::envelope;
use crate::error::{ClientError, Result};
use crate::rpc::{RpcTransport, SendStatus, SorobanRpc, TransactionInfo, TransactionStatus};

/// Bounds for the confirmation poller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// `getTransaction` calls before giving up; at least one is always made
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 60,
        }
    }
}

/// Terminal status reported by the network
#[derive(Clone, Debug)]
pub struct Confirmation {
    pub hash: String,
    /// `Success` or `Failed`, never `NotFound`
    pub status: TransactionStatus,
    pub ledger: Option<u32>,
    pub return_value: Option<ScVal>,
    pub info: TransactionInfo,
}

#[derive(Clone, Debug)]
pub enum SubmissionOutcome {
    Confirmed(Confirmation),
    /// Poll budget spent while the transaction was still unknown; it may
    /// still land
    TimedOut { hash: String, attempts: u32 },
}

impl SubmissionOutcome {
    pub fn hash(&self) -> &str {
        match self {
            SubmissionOutcome::Confirmed(c) => &c.hash,
            SubmissionOutcome::TimedOut { hash, .. } => hash,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SubmissionOutcome::Confirmed(Confirmation {
                status: TransactionStatus::Success,
                ..
            })
        )
    }
}

/// Send a signed envelope and wait for a terminal status
///
/// # Errors
/// - `Xdr`: `signed_xdr` is not an envelope
/// - `SubmissionRejected`: send status `ERROR` or `TRY_AGAIN_LATER`
/// - `Cancelled`: `cancel` fired while waiting
pub async fn submit<T: RpcTransport>(
    rpc: &SorobanRpc<T>,
    signed_xdr: &str,
    poll: &PollConfig,
    cancel: &CancellationToken,
) -> Result<SubmissionOutcome> {
    let envelope = envelope::from_base64(signed_xdr)?;
    let xdr = envelope::to_base64(&envelope)?;

    let sent = rpc.send_transaction(&xdr).await?;
    match sent.status {
        SendStatus::Pending => info!(hash = %sent.hash, "transaction pending"),
        SendStatus::Duplicate => info!(hash = %sent.hash, "transaction already submitted"),
        status => {
            warn!(hash = %sent.hash, ?status, "transaction rejected");
            return Err(ClientError::SubmissionRejected {
                status: format!("{status:?}"),
                error_result: sent.error_result_xdr,
            });
        }
    }

    wait_for_confirmation(rpc, &sent.hash, poll, cancel).await
}

/// Poll `getTransaction` while the status is `NOT_FOUND`
///
/// Transient transport errors count as an attempt and polling continues.
pub async fn wait_for_confirmation<T: RpcTransport>(
    rpc: &SorobanRpc<T>,
    hash: &str,
    poll: &PollConfig,
    cancel: &CancellationToken,
) -> Result<SubmissionOutcome> {
    let max_attempts = poll.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            response = rpc.get_transaction(hash) => response,
        };
        attempts += 1;

        match response {
            Ok(info) if info.status != TransactionStatus::NotFound => {
                info!(hash, status = ?info.status, attempts, "transaction finalized");
                return Ok(SubmissionOutcome::Confirmed(Confirmation {
                    hash: hash.to_string(),
                    status: info.status,
                    ledger: info.ledger,
                    return_value: info.return_value(),
                    info,
                }));
            }
            Ok(_) => debug!(hash, attempts, "transaction not found yet"),
            Err(e) if e.is_transient() => warn!(hash, attempts, error = %e, "poll failed"),
            Err(e) => return Err(e),
        }

        if attempts >= max_attempts {
            warn!(hash, attempts, "gave up waiting, outcome unknown");
            return Ok(SubmissionOutcome::TimedOut {
                hash: hash.to_string(),
                attempts,
            });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            _ = tokio::time::sleep(poll.interval) => {}
        }
    }
}
