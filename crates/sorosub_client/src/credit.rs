use rust_decimal::Decimal;
use serde::Serialize;
use sorosub_interface::BNPL_MIN_CREDIT_SCORE;
use tracing::{debug, warn};

use crate::error::Result;
use crate::horizon::{Horizon, HorizonTransport};

/// Flat component added to the Horizon score for display
pub const BASE_SCORE: u32 = 10;

pub const MAX_PAYMENT_BONUS: u32 = 20;

/// Operation types counted as payment activity
pub const PAYMENT_TYPES: [&str; 3] = [
    "payment",
    "path_payment_strict_receive",
    "path_payment_strict_send",
];

/// Raw on-chain statistics behind a score
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CreditInputs {
    pub account_sequence: i64,
    /// Native balance in display units
    pub native_balance: Decimal,
    pub payment_count: u32,
    pub transaction_count: u32,
}

/// Point breakdown of the Horizon heuristic (0-60)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HorizonCreditData {
    /// 0-15
    pub account_age_bonus: u32,
    /// 0-20
    pub payment_activity_bonus: u32,
    /// 0-15
    pub transaction_bonus: u32,
    /// 0-10
    pub balance_bonus: u32,
    pub total_horizon_score: u32,
    pub inputs: CreditInputs,
}

/// Sequence thresholds 10/50/100 give 5/10/15 points
///
/// Example:
/// - sequence 150 -> 15
/// - sequence 50 -> 5 (thresholds are strict)
pub fn account_age_bonus(sequence: i64) -> u32 {
    match sequence {
        s if s > 100 => 15,
        s if s > 50 => 10,
        s if s > 10 => 5,
        _ => 0,
    }
}

/// Native balance thresholds 1/10/100/1000 give 2/4/7/10 points
pub fn balance_bonus(native_balance: Decimal) -> u32 {
    if native_balance >= Decimal::from(1000) {
        10
    } else if native_balance >= Decimal::from(100) {
        7
    } else if native_balance >= Decimal::from(10) {
        4
    } else if native_balance >= Decimal::ONE {
        2
    } else {
        0
    }
}

/// One point per payment, saturating at 20
pub fn payment_activity_bonus(payment_count: u32) -> u32 {
    payment_count.min(MAX_PAYMENT_BONUS)
}

/// Transaction count thresholds 5/20/50 give 5/10/15 points
pub fn transaction_bonus(transaction_count: u32) -> u32 {
    match transaction_count {
        c if c >= 50 => 15,
        c if c >= 20 => 10,
        c if c >= 5 => 5,
        _ => 0,
    }
}

/// Deterministic score for a set of inputs
pub fn score_breakdown(inputs: CreditInputs) -> HorizonCreditData {
    let account_age_bonus = account_age_bonus(inputs.account_sequence);
    let payment_activity_bonus = payment_activity_bonus(inputs.payment_count);
    let transaction_bonus = transaction_bonus(inputs.transaction_count);
    let balance_bonus = balance_bonus(inputs.native_balance);

    HorizonCreditData {
        account_age_bonus,
        payment_activity_bonus,
        transaction_bonus,
        balance_bonus,
        total_horizon_score: account_age_bonus
            + payment_activity_bonus
            + transaction_bonus
            + balance_bonus,
        inputs,
    }
}

pub fn is_payment_type(kind: &str) -> bool {
    PAYMENT_TYPES.contains(&kind)
}

/// Gather inputs from Horizon and score them
///
/// A missing account scores zero. Failed history fetches count as zero
/// activity.
///
/// # Errors
/// Only the account fetch propagates (transport or decode failure).
pub async fn try_horizon_credit_data<H: HorizonTransport>(
    horizon: &Horizon<H>,
    account_id: &str,
) -> Result<HorizonCreditData> {
    let Some(account) = horizon.account(account_id).await? else {
        debug!(account_id, "account not on ledger, zero score");
        return Ok(HorizonCreditData::default());
    };

    let (payments, transactions) = tokio::join!(
        horizon.payments(account_id),
        horizon.transactions(account_id)
    );

    let payment_count = match payments {
        Ok(records) => records
            .iter()
            .filter(|r| r.kind.as_deref().is_some_and(is_payment_type))
            .count(),
        Err(e) => {
            warn!(account_id, error = %e, "payments fetch failed, counting 0");
            0
        }
    };
    let transaction_count = match transactions {
        Ok(records) => records.len(),
        Err(e) => {
            warn!(account_id, error = %e, "transactions fetch failed, counting 0");
            0
        }
    };

    let data = score_breakdown(CreditInputs {
        account_sequence: account.sequence_number(),
        native_balance: account.native_balance(),
        payment_count: u32::try_from(payment_count).unwrap_or(u32::MAX),
        transaction_count: u32::try_from(transaction_count).unwrap_or(u32::MAX),
    });
    debug!(account_id, total = data.total_horizon_score, "horizon score");
    Ok(data)
}

/// As [`try_horizon_credit_data`], scoring zero on any failure
pub async fn horizon_credit_data<H: HorizonTransport>(
    horizon: &Horizon<H>,
    account_id: &str,
) -> HorizonCreditData {
    match try_horizon_credit_data(horizon, account_id).await {
        Ok(data) => data,
        Err(e) => {
            warn!(account_id, error = %e, "horizon scoring failed, using zero");
            HorizonCreditData::default()
        }
    }
}

// ============================================
// DISPLAY
// ============================================

pub fn displayed_score(horizon_total: u32) -> u32 {
    BASE_SCORE + horizon_total
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum CreditTier {
    Starter,
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl CreditTier {
    /// Thresholds 30/50/70/100
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 100 => CreditTier::Platinum,
            s if s >= 70 => CreditTier::Gold,
            s if s >= 50 => CreditTier::Silver,
            s if s >= 30 => CreditTier::Bronze,
            _ => CreditTier::Starter,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CreditTier::Starter => "Starter",
            CreditTier::Bronze => "Bronze",
            CreditTier::Silver => "Silver",
            CreditTier::Gold => "Gold",
            CreditTier::Platinum => "Platinum",
        }
    }
}

/// Strictly above the contract's BNPL threshold
pub fn is_bnpl_eligible(score: u32) -> bool {
    score > BNPL_MIN_CREDIT_SCORE
}

/// Points still needed before BNPL unlocks; 0 once eligible
pub fn points_to_bnpl(score: u32) -> u32 {
    (BNPL_MIN_CREDIT_SCORE + 1).saturating_sub(score)
}
