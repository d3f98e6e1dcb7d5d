use std::time::Duration;

use chrono::Utc;
use stellar_xdr::curr::{ScVal, TransactionEnvelope};
use tracing::{debug, info, warn};

use crate::config::{NetworkConfig, LEDGER_CLOSE_SECS, READ_TIMEOUT_SECS, WRITE_TIMEOUT_SECS};
use crate::envelope::{self, Invocation, TxParams};
use crate::error::{ClientError, Result};
use crate::rpc::{AccountState, HttpRpc, RpcTransport, SorobanRpc};
use crate::scval::{address_arg, i128_arg, u32_arg, u64_arg, FromScVal};
use crate::types::{Subscription, UserDebt};

/// Ledgers an allowance stays valid: one year at ~5 s per ledger
pub const APPROVAL_LEDGERS: u32 = (365 * 24 * 60 * 60 / LEDGER_CLOSE_SECS as u64) as u32;

/// Simulated, unsigned transaction ready for a wallet signature
#[derive(Clone, Debug)]
pub struct PreparedTransaction {
    pub envelope: TransactionEnvelope,
    /// Base64 XDR of `envelope`
    pub xdr: String,
    /// Hex transaction hash on the configured network
    pub hash: String,
    pub fee: u32,
    /// Value the call returned during simulation
    pub simulated_result: ScVal,
}

/// Client for the SoroSub contract and its payment token
pub struct SoroSub<T> {
    rpc: SorobanRpc<T>,
    config: NetworkConfig,
}

impl SoroSub<HttpRpc> {
    pub fn from_config(config: NetworkConfig) -> Result<Self> {
        let transport = HttpRpc::new(
            config.rpc_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(Self::new(config, transport))
    }
}

impl<T: RpcTransport> SoroSub<T> {
    pub fn new(config: NetworkConfig, transport: T) -> Self {
        Self {
            rpc: SorobanRpc::new(transport),
            config,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn rpc(&self) -> &SorobanRpc<T> {
        &self.rpc
    }

    fn write_params(&self) -> TxParams {
        TxParams {
            base_fee: self.config.write_fee,
            timeout_secs: WRITE_TIMEOUT_SECS,
        }
    }

    fn read_params(&self) -> TxParams {
        TxParams {
            base_fee: self.config.read_fee,
            timeout_secs: READ_TIMEOUT_SECS,
        }
    }

    fn contract_call(&self, function: &'static str, args: Vec<ScVal>) -> Invocation {
        Invocation {
            contract_id: self.config.contract_id.clone(),
            function,
            args,
        }
    }

    // ============================================
    // TRANSACTION BUILDERS
    // ============================================

    /// Fetch sequence, build, simulate and assemble one contract call
    ///
    /// # Errors
    /// - `AccountNotFound`: `source` is not funded; not ready to transact
    /// - `Simulation`: the contract rejected the call
    async fn prepare(&self, source: &str, invocation: Invocation) -> Result<PreparedTransaction> {
        let account = self.rpc.get_account(source).await?;
        let tx = envelope::build_invoke_transaction(
            &account,
            &invocation,
            self.write_params(),
            now_unix(),
        )?;
        let draft = envelope::to_base64(&envelope::envelope(tx.clone()))?;
        let simulation = self.rpc.simulate_transaction(&draft).await?;
        let tx = envelope::assemble(tx, &simulation)?;

        let hash = envelope::hex(&envelope::transaction_hash(
            &tx,
            &self.config.network_passphrase,
        )?);
        let fee = tx.fee;
        let envelope = envelope::envelope(tx);
        let xdr = envelope::to_base64(&envelope)?;

        info!(
            function = invocation.function,
            source,
            fee,
            hash = %hash,
            "prepared transaction"
        );
        Ok(PreparedTransaction {
            envelope,
            xdr,
            hash,
            fee,
            simulated_result: simulation.retval,
        })
    }

    pub async fn create_subscription(
        &self,
        subscriber: &str,
        merchant: &str,
        token: &str,
        amount: i128,
        interval: u64,
    ) -> Result<PreparedTransaction> {
        let call = self.contract_call(
            "create_subscription",
            vec![
                address_arg(subscriber)?,
                address_arg(merchant)?,
                address_arg(token)?,
                i128_arg(amount),
                u64_arg(interval),
            ],
        );
        self.prepare(subscriber, call).await
    }

    pub async fn cancel_subscription(
        &self,
        subscriber: &str,
        merchant: &str,
    ) -> Result<PreparedTransaction> {
        let call = self.contract_call(
            "cancel_subscription",
            vec![address_arg(subscriber)?, address_arg(merchant)?],
        );
        self.prepare(subscriber, call).await
    }

    /// Token allowance letting `spender` pull up to `amount` until
    /// `expiration_ledger`
    pub async fn approve(
        &self,
        owner: &str,
        token: &str,
        spender: &str,
        amount: i128,
        expiration_ledger: u32,
    ) -> Result<PreparedTransaction> {
        let call = Invocation {
            contract_id: token.to_string(),
            function: "approve",
            args: vec![
                address_arg(owner)?,
                address_arg(spender)?,
                i128_arg(amount),
                u32_arg(expiration_ledger),
            ],
        };
        self.prepare(owner, call).await
    }

    pub async fn repay_debt(&self, user: &str, amount: i128) -> Result<PreparedTransaction> {
        let call = self.contract_call("repay_debt", vec![address_arg(user)?, i128_arg(amount)]);
        self.prepare(user, call).await
    }

    /// Merchant-triggered charge; `caller` pays the fee
    pub async fn collect_payment(
        &self,
        caller: &str,
        subscriber: &str,
        merchant: &str,
    ) -> Result<PreparedTransaction> {
        let call = self.contract_call(
            "collect_payment",
            vec![address_arg(subscriber)?, address_arg(merchant)?],
        );
        self.prepare(caller, call).await
    }

    pub async fn initialize(
        &self,
        admin: &str,
        liquidity_pool: &str,
    ) -> Result<PreparedTransaction> {
        let call = self.contract_call(
            "initialize",
            vec![address_arg(admin)?, address_arg(liquidity_pool)?],
        );
        self.prepare(admin, call).await
    }

    /// Expiration ledger for a one-year allowance, from the latest ledger
    pub async fn approval_expiration_ledger(&self) -> Result<u32> {
        let latest = self.rpc.get_latest_ledger().await?;
        Ok(latest.sequence.saturating_add(APPROVAL_LEDGERS))
    }

    // ============================================
    // READ QUERIES (fallible)
    // ============================================

    /// Simulate a read-only call and decode its return value
    ///
    /// With `placeholder_source`, a missing source account is replaced by a
    /// zero-sequence stand-in; simulation does not check sequence numbers.
    async fn read<V: FromScVal>(
        &self,
        source: &str,
        invocation: Invocation,
        placeholder_source: bool,
    ) -> Result<V> {
        let account = match self.rpc.get_account(source).await {
            Ok(account) => account,
            Err(ClientError::AccountNotFound(_)) if placeholder_source => AccountState {
                account_id: source.to_string(),
                sequence: 0,
                balance: 0,
            },
            Err(e) => return Err(e),
        };
        let tx = envelope::build_invoke_transaction(
            &account,
            &invocation,
            self.read_params(),
            now_unix(),
        )?;
        let xdr = envelope::to_base64(&envelope::envelope(tx))?;
        let simulation = self.rpc.simulate_transaction(&xdr).await?;
        V::from_scval(&simulation.retval)
    }

    /// # Errors
    /// - `RecordNotFound`: no subscription for this subscriber/merchant pair
    pub async fn try_get_subscription(
        &self,
        subscriber: &str,
        merchant: &str,
    ) -> Result<Subscription> {
        let call = self.contract_call(
            "get_subscription",
            vec![address_arg(subscriber)?, address_arg(merchant)?],
        );
        self.read(subscriber, call, false)
            .await
            .map_err(|e| trap_as(e, ClientError::RecordNotFound("subscription")))
    }

    pub async fn try_get_user_debt(&self, user: &str) -> Result<Option<UserDebt>> {
        let call = self.contract_call("get_user_debt", vec![address_arg(user)?]);
        self.read(user, call, false).await
    }

    pub async fn try_get_credit_score(&self, subscriber: &str, merchant: &str) -> Result<u32> {
        let call = self.contract_call(
            "get_credit_score",
            vec![address_arg(subscriber)?, address_arg(merchant)?],
        );
        self.read(subscriber, call, false)
            .await
            .map_err(|e| trap_as(e, ClientError::RecordNotFound("subscription")))
    }

    pub async fn try_can_process_payment(&self, subscriber: &str, merchant: &str) -> Result<bool> {
        let call = self.contract_call(
            "can_process_payment",
            vec![address_arg(subscriber)?, address_arg(merchant)?],
        );
        self.read(subscriber, call, false).await
    }

    pub async fn try_is_initialized(&self) -> Result<bool> {
        let call = self.contract_call("is_initialized", vec![]);
        self.read(&self.config.simulation_source, call, true).await
    }

    /// # Errors
    /// - `ContractNotInitialized`: no pool has been set
    pub async fn try_get_liquidity_pool(&self) -> Result<String> {
        let call = self.contract_call("get_liquidity_pool", vec![]);
        self.read(&self.config.simulation_source, call, true)
            .await
            .map_err(|e| trap_as(e, ClientError::ContractNotInitialized))
    }

    /// Token balance of `owner` in the smallest unit
    pub async fn try_token_balance(&self, owner: &str, token: &str) -> Result<i128> {
        let call = Invocation {
            contract_id: token.to_string(),
            function: "balance",
            args: vec![address_arg(owner)?],
        };
        self.read(owner, call, false).await
    }

    // ============================================
    // READ QUERIES ("no data" on failure)
    // ============================================

    pub async fn get_subscription(&self, subscriber: &str, merchant: &str) -> Option<Subscription> {
        let result = self.try_get_subscription(subscriber, merchant).await;
        or_no_data(result.map(Some), None, "get_subscription")
    }

    /// `None` both when the user owes nothing and when no data is available
    pub async fn get_user_debt(&self, user: &str) -> Option<UserDebt> {
        or_no_data(self.try_get_user_debt(user).await, None, "get_user_debt")
    }

    pub async fn get_credit_score(&self, subscriber: &str, merchant: &str) -> u32 {
        let result = self.try_get_credit_score(subscriber, merchant).await;
        or_no_data(result, 0, "get_credit_score")
    }

    pub async fn can_process_payment(&self, subscriber: &str, merchant: &str) -> bool {
        let result = self.try_can_process_payment(subscriber, merchant).await;
        or_no_data(result, false, "can_process_payment")
    }

    pub async fn is_initialized(&self) -> bool {
        or_no_data(self.try_is_initialized().await, false, "is_initialized")
    }

    pub async fn get_liquidity_pool(&self) -> Option<String> {
        let result = self.try_get_liquidity_pool().await;
        or_no_data(result.map(Some), None, "get_liquidity_pool")
    }

    pub async fn token_balance(&self, owner: &str, token: &str) -> i128 {
        or_no_data(self.try_token_balance(owner, token).await, 0, "balance")
    }

    /// Active subscriptions of `user` with each of `providers`
    pub async fn get_user_subscriptions(
        &self,
        user: &str,
        providers: &[String],
    ) -> Vec<Subscription> {
        let mut subscriptions = Vec::new();
        for provider in providers {
            if let Some(subscription) = self.get_subscription(user, provider).await {
                if subscription.is_active {
                    subscriptions.push(subscription);
                }
            }
        }
        debug!(user, found = subscriptions.len(), "scanned providers");
        subscriptions
    }
}

/// Lookup reads only trap on an absent key, so a trap means `missing`
fn trap_as(error: ClientError, missing: ClientError) -> ClientError {
    if error.is_vm_trap() {
        missing
    } else {
        error
    }
}

/// Collapse a query error into its "no data" default, logging by class
pub(crate) fn or_no_data<V>(result: Result<V>, default: V, query: &str) -> V {
    match result {
        Ok(value) => value,
        Err(e) if e.is_not_ready() || e.is_missing_record() => {
            debug!(query, error = %e, "no data yet");
            default
        }
        Err(e) => {
            warn!(query, error = %e, "query failed, using default");
            default
        }
    }
}

pub(crate) fn now_unix() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_ledgers_is_one_year() {
        assert_eq!(APPROVAL_LEDGERS, 6_307_200);
    }

    #[test]
    fn test_or_no_data_defaults() {
        assert_eq!(or_no_data(Ok(5u32), 0, "q"), 5);
        assert_eq!(
            or_no_data(Err(ClientError::AccountNotFound("G".into())), 0u32, "q"),
            0
        );
        assert!(!or_no_data(Err(ClientError::Decode("bad".into())), false, "q"));
    }
}
