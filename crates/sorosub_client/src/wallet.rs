use std::future::Future;

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use stellar_strkey::ed25519;
use stellar_xdr::curr::{DecoratedSignature, Signature, SignatureHint, TransactionEnvelope};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::envelope;
use crate::error::{ClientError, Result};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WalletError {
    /// No wallet provider is available
    #[error("wallet not installed")]
    NotInstalled,
    /// The user declined the request in the wallet
    #[error("request rejected by user")]
    UserRejected,
    #[error("wallet not connected")]
    NotConnected,
    #[error("wallet error: {0}")]
    Provider(String),
}

/// External signer holding the user's key
pub trait WalletProvider: Send + Sync {
    fn is_connected(&self) -> impl Future<Output = Result<bool, WalletError>> + Send;

    /// Ask the user to share their address
    fn request_access(&self) -> impl Future<Output = Result<String, WalletError>> + Send;

    fn get_address(&self) -> impl Future<Output = Result<String, WalletError>> + Send;

    /// Sign a base64 envelope; returns the signed envelope
    fn sign_transaction(
        &self,
        envelope_xdr: &str,
        network_passphrase: &str,
    ) -> impl Future<Output = Result<String, WalletError>> + Send;

    fn sign_message(
        &self,
        message: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, WalletError>> + Send;
}

// ============================================
// CONNECTION STATE
// ============================================

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WalletState {
    pub is_connected: bool,
    pub is_loading: bool,
    pub public_key: Option<String>,
    pub error: Option<String>,
}

/// Single owner of the wallet connection state
///
/// Every change is published as a whole snapshot on a watch channel; any
/// number of readers call [`WalletSession::subscribe`]. Each session is an
/// independent value.
pub struct WalletSession<P> {
    provider: P,
    state: watch::Sender<WalletState>,
}

impl<P: WalletProvider> WalletSession<P> {
    pub fn new(provider: P) -> Self {
        let (state, _) = watch::channel(WalletState::default());
        Self { provider, state }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> WalletState {
        self.state.borrow().clone()
    }

    pub fn public_key(&self) -> Option<String> {
        self.state.borrow().public_key.clone()
    }

    fn publish(&self, next: WalletState) {
        self.state.send_replace(next);
    }

    fn set_loading(&self) {
        let mut next = self.state();
        next.is_loading = true;
        next.error = None;
        self.publish(next);
    }

    fn connected(&self, public_key: String) {
        self.publish(WalletState {
            is_connected: true,
            is_loading: false,
            public_key: Some(public_key),
            error: None,
        });
    }

    fn failed(&self, error: Option<String>) {
        self.publish(WalletState {
            error,
            ..WalletState::default()
        });
    }

    /// Pick up an existing authorization without prompting
    pub async fn restore(&self) -> Option<String> {
        self.set_loading();
        let restored = match self.provider.is_connected().await {
            Ok(true) => self.provider.get_address().await.ok(),
            _ => None,
        };
        match restored {
            Some(public_key) => {
                debug!(%public_key, "wallet session restored");
                self.connected(public_key.clone());
                Some(public_key)
            }
            None => {
                self.failed(None);
                None
            }
        }
    }

    /// Prompt the user for access
    ///
    /// # Errors
    /// - `Wallet(UserRejected)`: user declined; state returns to disconnected
    ///   with no error message
    /// - `Wallet(NotInstalled)`: no provider; state carries an error message
    pub async fn connect(&self) -> Result<String> {
        self.set_loading();
        match self.provider.request_access().await {
            Ok(public_key) => {
                info!(%public_key, "wallet connected");
                self.connected(public_key.clone());
                Ok(public_key)
            }
            Err(WalletError::UserRejected) => {
                debug!("wallet access declined");
                self.failed(None);
                Err(WalletError::UserRejected.into())
            }
            Err(e) => {
                warn!(error = %e, "wallet connection failed");
                self.failed(Some(e.to_string()));
                Err(e.into())
            }
        }
    }

    pub fn disconnect(&self) {
        self.publish(WalletState::default());
    }

    /// Sign with the connected wallet
    ///
    /// # Errors
    /// - `Wallet(NotConnected)`: call `connect` first
    /// - `Wallet(UserRejected)`: user declined to sign
    pub async fn sign(&self, envelope_xdr: &str, network_passphrase: &str) -> Result<String> {
        if !self.state.borrow().is_connected {
            return Err(WalletError::NotConnected.into());
        }
        Ok(self
            .provider
            .sign_transaction(envelope_xdr, network_passphrase)
            .await?)
    }
}

// ============================================
// LOCAL KEYPAIR SIGNER
// ============================================

/// Provider backed by a local ed25519 secret, for scripts and the CLI
pub struct KeypairWallet {
    signing_key: SigningKey,
}

impl KeypairWallet {
    /// # Errors
    /// - `InvalidAddress`: not an `S...` secret seed
    pub fn from_secret(secret: &str) -> Result<Self> {
        let seed = ed25519::PrivateKey::from_string(secret.trim())
            .map_err(|_| ClientError::InvalidAddress("secret seed".into()))?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed.0),
        })
    }

    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// `G...` account id
    pub fn public_key(&self) -> String {
        ed25519::PublicKey(self.signing_key.verifying_key().to_bytes()).to_string()
    }

    /// `S...` secret seed
    pub fn secret(&self) -> String {
        ed25519::PrivateKey(self.signing_key.to_bytes()).to_string()
    }

    /// Last four bytes of the public key
    pub fn hint(&self) -> SignatureHint {
        let key = self.signing_key.verifying_key().to_bytes();
        SignatureHint([key[28], key[29], key[30], key[31]])
    }

    pub fn sign_envelope(&self, envelope: &mut TransactionEnvelope, passphrase: &str) -> Result<()> {
        let TransactionEnvelope::Tx(v1) = &*envelope else {
            return Err(ClientError::Decode("only v1 envelopes can be signed".into()));
        };
        let hash = envelope::transaction_hash(&v1.tx, passphrase)?;
        let signature = self.signing_key.sign(&hash);
        let decorated = DecoratedSignature {
            hint: self.hint(),
            signature: Signature(signature.to_bytes().to_vec().try_into()?),
        };
        envelope::add_signature(envelope, decorated)
    }
}

impl WalletProvider for KeypairWallet {
    async fn is_connected(&self) -> Result<bool, WalletError> {
        Ok(true)
    }

    async fn request_access(&self) -> Result<String, WalletError> {
        Ok(self.public_key())
    }

    async fn get_address(&self) -> Result<String, WalletError> {
        Ok(self.public_key())
    }

    async fn sign_transaction(
        &self,
        envelope_xdr: &str,
        network_passphrase: &str,
    ) -> Result<String, WalletError> {
        let sign = || -> Result<String> {
            let mut envelope = envelope::from_base64(envelope_xdr)?;
            self.sign_envelope(&mut envelope, network_passphrase)?;
            envelope::to_base64(&envelope)
        };
        sign().map_err(|e| WalletError::Provider(e.to_string()))
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, WalletError> {
        Ok(self.signing_key.sign(message).to_bytes().to_vec())
    }
}
