use rust_decimal::Decimal;
use serde::Serialize;
use stellar_xdr::curr::ScVal;

use crate::amount::{from_smallest_unit, RawAmount};
use crate::error::Result;
use crate::scval::{map_entries, required, FromScVal};

/// Subscription record as stored by the contract, keyed by
/// (subscriber, merchant)
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub subscriber: String,
    pub merchant: String,
    pub token: String,
    /// Smallest unit
    pub amount: i128,
    /// Seconds between charges
    pub interval: u64,
    /// Unix seconds; 0 until the first charge
    pub last_payment_time: u64,
    pub is_active: bool,
    pub credit_score: u32,
}

impl Subscription {
    /// Earliest time the next charge is allowed
    ///
    /// The first payment is allowed immediately, so a subscription that has
    /// never been charged is due at `now`.
    pub fn next_payment_time(&self, now: u64) -> u64 {
        if self.last_payment_time == 0 {
            now
        } else {
            self.last_payment_time.saturating_add(self.interval)
        }
    }

    pub fn is_due(&self, now: u64) -> bool {
        self.is_active && now >= self.next_payment_time(now)
    }

    pub fn display_amount(&self) -> Decimal {
        from_smallest_unit(&RawAmount::Integer(self.amount))
    }
}

impl FromScVal for Subscription {
    fn from_scval(value: &ScVal) -> Result<Self> {
        let mut subscriber = None;
        let mut merchant = None;
        let mut token = None;
        let mut amount = None;
        let mut interval = None;
        let mut last_payment_time = None;
        let mut is_active = None;
        let mut credit_score = None;

        for (key, val) in map_entries(value)? {
            match key.as_str() {
                "subscriber" => subscriber = Some(String::from_scval(val)?),
                "merchant" => merchant = Some(String::from_scval(val)?),
                "token" => token = Some(String::from_scval(val)?),
                "amount" => amount = Some(i128::from_scval(val)?),
                "interval" => interval = Some(u64::from_scval(val)?),
                // Older contract builds name this `last_payment`
                "last_payment_time" | "last_payment" => {
                    last_payment_time = Some(u64::from_scval(val)?)
                }
                "is_active" => is_active = Some(bool::from_scval(val)?),
                "credit_score" => credit_score = Some(u32::from_scval(val)?),
                _ => {}
            }
        }

        Ok(Subscription {
            subscriber: required(subscriber, "subscriber", "Subscription")?,
            merchant: required(merchant, "merchant", "Subscription")?,
            token: required(token, "token", "Subscription")?,
            amount: required(amount, "amount", "Subscription")?,
            interval: required(interval, "interval", "Subscription")?,
            last_payment_time: last_payment_time.unwrap_or(0),
            is_active: required(is_active, "is_active", "Subscription")?,
            credit_score: credit_score.unwrap_or(0),
        })
    }
}

/// Outstanding Buy-Now-Pay-Later balance. Absence is `None`, never a zero
/// record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserDebt {
    /// Smallest unit
    pub amount: i128,
    pub token: String,
}

impl UserDebt {
    pub fn display_amount(&self) -> Decimal {
        from_smallest_unit(&RawAmount::Integer(self.amount))
    }
}

impl FromScVal for UserDebt {
    fn from_scval(value: &ScVal) -> Result<Self> {
        let mut amount = None;
        let mut token = None;
        for (key, val) in map_entries(value)? {
            match key.as_str() {
                "amount" => amount = Some(i128::from_scval(val)?),
                "token" => token = Some(String::from_scval(val)?),
                _ => {}
            }
        }
        Ok(UserDebt {
            amount: required(amount, "amount", "UserDebt")?,
            token: required(token, "token", "UserDebt")?,
        })
    }
}
