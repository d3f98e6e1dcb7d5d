use thiserror::Error;

use crate::wallet::WalletError;

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ClientError {
    // ============================================
    // NOT-READY ERRORS
    // ============================================
    /// Account has no ledger entry yet (unfunded)
    #[error("account not found: {0}")]
    AccountNotFound(String),
    /// Contract has not been initialized by its admin
    #[error("contract not initialized")]
    ContractNotInitialized,
    /// Lookup read trapped because the contract holds no such record
    #[error("no {0} record")]
    RecordNotFound(&'static str),

    // ============================================
    // WALLET ERRORS
    // ============================================
    #[error(transparent)]
    Wallet(#[from] WalletError),

    // ============================================
    // TRANSIENT ERRORS
    // ============================================
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// JSON-RPC error object returned by the Soroban RPC server
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("horizon request failed: {0}")]
    Horizon(String),

    // ============================================
    // DATA ERRORS
    // ============================================
    /// Contract return value has an unexpected shape
    #[error("cannot decode contract value: {0}")]
    Decode(String),
    #[error("xdr error: {0}")]
    Xdr(#[from] stellar_xdr::curr::Error),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    // ============================================
    // CONTRACT / SUBMISSION ERRORS
    // ============================================
    /// Simulation reported an error (includes contract panics)
    #[error("simulation failed: {0}")]
    Simulation(String),
    #[error("transaction rejected with status {status}")]
    SubmissionRejected {
        status: String,
        error_result: Option<String>,
    },
    #[error("operation cancelled")]
    Cancelled,

    // ============================================
    // CONFIGURATION / LOCAL ERRORS
    // ============================================
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// "No data yet": unfunded account, uninitialized contract, missing wallet
    pub fn is_not_ready(&self) -> bool {
        match self {
            ClientError::AccountNotFound(_) | ClientError::ContractNotInitialized => true,
            ClientError::Wallet(WalletError::NotInstalled) => true,
            _ => false,
        }
    }

    /// The user declined in the wallet; callers treat this as silent cancellation
    pub fn is_user_declined(&self) -> bool {
        matches!(self, ClientError::Wallet(WalletError::UserRejected))
    }

    /// Network-level failure worth retrying on the next refresh
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Http(_) | ClientError::Rpc { .. } | ClientError::Horizon(_)
        )
    }

    /// The contract holds no record for the request
    pub fn is_missing_record(&self) -> bool {
        matches!(self, ClientError::RecordNotFound(_))
    }

    /// Simulation aborted in the VM
    ///
    /// Contract panics lose their message in release builds and all surface
    /// as `Error(WasmVm, InvalidAction)`.
    pub fn is_vm_trap(&self) -> bool {
        match self {
            ClientError::Simulation(message) => message.contains(VM_TRAP),
            _ => false,
        }
    }
}

const VM_TRAP: &str = "Error(WasmVm, InvalidAction)";
