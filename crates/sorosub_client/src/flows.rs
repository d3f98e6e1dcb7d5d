//! Multi-step user flows: build, sign with the connected wallet, submit.
//!
//! A user declining in the wallet ends a flow quietly with
//! [`FlowOutcome::Declined`]; it is not an error.

use rust_decimal::{prelude::ToPrimitive, Decimal};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::amount::to_smallest_unit;
use crate::cache::{KeyValueStore, StoredSubscription, SubscriptionCache};
use crate::error::{ClientError, Result};
use crate::rpc::RpcTransport;
use crate::sorosub::{PreparedTransaction, SoroSub};
use crate::submit::{submit, PollConfig, SubmissionOutcome};
use crate::wallet::{WalletError, WalletProvider, WalletSession};

/// Billing periods covered by the token allowance granted on subscribe
pub const ALLOWANCE_PERIODS: i128 = 12;

#[derive(Clone, Debug)]
pub enum FlowOutcome {
    /// Every transaction confirmed successfully; hash of the last one
    Completed { hash: String },
    /// The user declined a signature; nothing further was sent
    Declined,
    /// A step did not confirm successfully (failed or timed out)
    Incomplete {
        step: &'static str,
        outcome: SubmissionOutcome,
    },
}

impl FlowOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, FlowOutcome::Completed { .. })
    }
}

/// New subscription as entered by the user
#[derive(Clone, Debug)]
pub struct SubscribeRequest {
    pub name: String,
    pub merchant: String,
    /// Display units per period
    pub amount: Decimal,
    pub interval: u64,
}

/// Shared dependencies for a flow run
pub struct FlowContext<'a, T, P> {
    pub client: &'a SoroSub<T>,
    pub wallet: &'a WalletSession<P>,
    pub poll: PollConfig,
    pub cancel: CancellationToken,
}

enum Step {
    Confirmed(String),
    Stopped(FlowOutcome),
}

impl<'a, T: RpcTransport, P: WalletProvider> FlowContext<'a, T, P> {
    pub fn new(client: &'a SoroSub<T>, wallet: &'a WalletSession<P>) -> Self {
        Self {
            client,
            wallet,
            poll: PollConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    fn user(&self) -> Result<String> {
        self.wallet
            .public_key()
            .ok_or(ClientError::Wallet(WalletError::NotConnected))
    }

    async fn sign_and_submit(
        &self,
        step: &'static str,
        prepared: PreparedTransaction,
    ) -> Result<Step> {
        let passphrase = &self.client.config().network_passphrase;
        let signed = match self.wallet.sign(&prepared.xdr, passphrase).await {
            Ok(signed) => signed,
            Err(e) if e.is_user_declined() => {
                info!(step, "signature declined");
                return Ok(Step::Stopped(FlowOutcome::Declined));
            }
            Err(e) => return Err(e),
        };

        let outcome = submit(self.client.rpc(), &signed, &self.poll, &self.cancel).await?;
        if outcome.is_success() {
            Ok(Step::Confirmed(outcome.hash().to_string()))
        } else {
            warn!(step, hash = outcome.hash(), "step did not confirm");
            Ok(Step::Stopped(FlowOutcome::Incomplete { step, outcome }))
        }
    }

    /// Approve the contract for twelve periods, create the subscription,
    /// then remember it in `cache`
    ///
    /// # Errors
    /// - `Wallet(NotConnected)`: no connected wallet
    /// - `InvalidAmount`: amount does not fit the ledger's integer range
    /// - any builder or submission error from either transaction
    pub async fn subscribe<S: KeyValueStore>(
        &self,
        request: &SubscribeRequest,
        cache: &SubscriptionCache<S>,
    ) -> Result<FlowOutcome> {
        let user = self.user()?;
        let config = self.client.config();
        let amount = to_smallest_unit(request.amount)?;
        let allowance = amount
            .checked_mul(ALLOWANCE_PERIODS)
            .ok_or_else(|| ClientError::InvalidAmount(request.amount.to_string()))?;

        let expiration = self.client.approval_expiration_ledger().await?;
        let approve = self
            .client
            .approve(&user, &config.token_id, &config.contract_id, allowance, expiration)
            .await?;
        if let Step::Stopped(outcome) = self.sign_and_submit("approve", approve).await? {
            return Ok(outcome);
        }

        let create = self
            .client
            .create_subscription(
                &user,
                &request.merchant,
                &config.token_id,
                amount,
                request.interval,
            )
            .await?;
        let hash = match self.sign_and_submit("create_subscription", create).await? {
            Step::Confirmed(hash) => hash,
            Step::Stopped(outcome) => return Ok(outcome),
        };

        cache.add(StoredSubscription::new(
            request.name.clone(),
            request.merchant.clone(),
            request.amount.to_f64().unwrap_or_default(),
            request.interval,
            config.token_id.clone(),
        ));
        info!(%user, merchant = %request.merchant, %hash, "subscribed");
        Ok(FlowOutcome::Completed { hash })
    }

    /// Cancel on the ledger, then drop cached records for `merchant`
    pub async fn cancel<S: KeyValueStore>(
        &self,
        merchant: &str,
        cache: &SubscriptionCache<S>,
    ) -> Result<FlowOutcome> {
        let user = self.user()?;
        let prepared = self.client.cancel_subscription(&user, merchant).await?;
        match self.sign_and_submit("cancel_subscription", prepared).await? {
            Step::Confirmed(hash) => {
                let removed = cache.remove_provider(merchant);
                info!(%user, merchant, removed, %hash, "subscription cancelled");
                Ok(FlowOutcome::Completed { hash })
            }
            Step::Stopped(outcome) => Ok(outcome),
        }
    }

    /// Repay `amount` display units of BNPL debt
    pub async fn repay(&self, amount: Decimal) -> Result<FlowOutcome> {
        let user = self.user()?;
        let prepared = self
            .client
            .repay_debt(&user, to_smallest_unit(amount)?)
            .await?;
        match self.sign_and_submit("repay_debt", prepared).await? {
            Step::Confirmed(hash) => {
                info!(%user, %amount, %hash, "debt repaid");
                Ok(FlowOutcome::Completed { hash })
            }
            Step::Stopped(outcome) => Ok(outcome),
        }
    }
}
