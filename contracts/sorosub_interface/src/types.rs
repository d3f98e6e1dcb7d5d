use soroban_sdk::{contracttype, Address};

// Constants
pub const SCALE: i128 = 10_000_000; // 7 decimals
pub const BNPL_MIN_CREDIT_SCORE: u32 = 50;

/// Unique key for each subscription (subscriber + merchant pair)
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscriptionKey {
    pub subscriber: Address,
    pub merchant: Address,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Subscription {
    /// Account authorizing the recurring pull
    pub subscriber: Address,
    /// Account receiving payments
    pub merchant: Address,
    /// Token contract used for payments
    pub token: Address,
    /// Amount per period, in the token's smallest unit
    pub amount: i128,
    /// Seconds between allowed charges
    pub interval: u64,
    /// Unix timestamp of the last charge (0 until the first one)
    pub last_payment_time: u64,
    pub is_active: bool,
    /// Score attached to this subscriber/merchant pair
    pub credit_score: u32,
}

/// Outstanding Buy-Now-Pay-Later balance
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UserDebt {
    pub amount: i128,
    pub token: Address,
}
