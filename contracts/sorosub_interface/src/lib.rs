#![no_std]

mod types;

pub use types::*;

use soroban_sdk::{contractclient, Address, Env};

/// Surface of the deployed SoroSub contract.
///
/// The contract lives outside this workspace and is referenced by id only.
/// Lookups of absent records panic without an error code, so a release
/// build reports them as a VM trap (`Error(WasmVm, InvalidAction)`).
/// `SoroSubClient` is generated from this trait and invokes it from inside a
/// Soroban environment; the off-chain client encodes the same calls as
/// `InvokeHostFunction` operations.
#[contractclient(name = "SoroSubClient")]
pub trait SoroSubInterface {
    // ============================================
    // INITIALIZATION
    // ============================================

    /// Set the admin and the liquidity pool funding BNPL payments
    fn initialize(env: Env, admin: Address, liquidity_pool: Address);

    /// Whether `initialize` has run
    fn is_initialized(env: Env) -> bool;

    fn get_liquidity_pool(env: Env) -> Address;

    // ============================================
    // SUBSCRIPTIONS
    // ============================================

    /// Create a subscription; `subscriber` must authorize
    fn create_subscription(
        env: Env,
        subscriber: Address,
        merchant: Address,
        token: Address,
        amount: i128,
        interval: u64,
    ) -> Subscription;

    /// Deactivate a subscription; `subscriber` must authorize
    fn cancel_subscription(env: Env, subscriber: Address, merchant: Address);

    /// Pull one period's payment, falling back to BNPL when the subscriber's
    /// balance is short and their score is above `BNPL_MIN_CREDIT_SCORE`
    ///
    /// # Returns
    /// The amount transferred
    fn collect_payment(env: Env, subscriber: Address, merchant: Address) -> i128;

    fn get_subscription(env: Env, subscriber: Address, merchant: Address) -> Subscription;

    fn can_process_payment(env: Env, subscriber: Address, merchant: Address) -> bool;

    fn get_credit_score(env: Env, subscriber: Address, merchant: Address) -> u32;

    // ============================================
    // BNPL DEBT
    // ============================================

    /// `None` when the user owes nothing
    fn get_user_debt(env: Env, user: Address) -> Option<UserDebt>;

    /// Repay part or all of the debt
    ///
    /// # Returns
    /// Remaining debt
    fn repay_debt(env: Env, user: Address, amount: i128) -> i128;
}
