use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::amount::{from_smallest_unit, RawAmount};
use crate::cache::StoredSubscription;
use crate::credit::{displayed_score, try_horizon_credit_data, HorizonCreditData};
use crate::error::Result;
use crate::horizon::{Horizon, HorizonTransport};
use crate::rpc::RpcTransport;
use crate::sorosub::{or_no_data, SoroSub};
use crate::types::{Subscription, UserDebt};

/// Everything the wallet dashboard shows for one account
#[derive(Clone, Debug, Default, Serialize)]
pub struct WalletOverview {
    /// Active subscriptions found on the ledger
    pub subscriptions: Vec<Subscription>,
    /// On-chain score with the first merchant
    pub credit_score: u32,
    pub horizon: HorizonCreditData,
    /// `BASE_SCORE` plus the Horizon total
    pub displayed_score: u32,
    /// Payment token balance in display units
    pub token_balance: Decimal,
    pub debt: Option<UserDebt>,
    /// One line per field that fell back to its default
    pub notes: Vec<String>,
}

/// Configured providers followed by any cached ones, without duplicates
pub fn provider_list(known: &[String], cached: &[StoredSubscription]) -> Vec<String> {
    let mut providers: Vec<String> = Vec::new();
    let cached = cached.iter().map(|s| &s.provider_address);
    for provider in known.iter().chain(cached) {
        if !providers.contains(provider) {
            providers.push(provider.clone());
        }
    }
    providers
}

fn settle<V>(result: Result<V>, default: V, field: &'static str, notes: &mut Vec<String>) -> V {
    if let Err(e) = &result {
        if !(e.is_missing_record() || e.is_not_ready()) {
            notes.push(format!("{field}: {e}"));
        }
    }
    or_no_data(result, default, field)
}

async fn scan_subscriptions<T: RpcTransport>(
    client: &SoroSub<T>,
    user: &str,
    providers: &[String],
) -> (Vec<Subscription>, Vec<String>) {
    let mut subscriptions = Vec::new();
    let mut notes = Vec::new();
    for provider in providers {
        let result = client.try_get_subscription(user, provider).await;
        if let Some(subscription) = settle(result.map(Some), None, "subscription", &mut notes) {
            if subscription.is_active {
                subscriptions.push(subscription);
            }
        }
    }
    (subscriptions, notes)
}

/// Fetch subscriptions, debt, token balance and the Horizon score
/// concurrently
///
/// Each field falls back to its empty value on its own. A failure in one
/// never blanks the others; it adds a line to `notes` instead.
pub async fn fetch_overview<T: RpcTransport, H: HorizonTransport>(
    client: &SoroSub<T>,
    horizon: &Horizon<H>,
    user: &str,
    providers: &[String],
) -> WalletOverview {
    let token = client.config().token_id.as_str();
    let ((subscriptions, mut notes), debt, balance, horizon_data) = tokio::join!(
        scan_subscriptions(client, user, providers),
        client.try_get_user_debt(user),
        client.try_token_balance(user, token),
        try_horizon_credit_data(horizon, user),
    );

    let debt = settle(debt, None, "debt", &mut notes);
    let balance = settle(balance, 0, "token_balance", &mut notes);
    let horizon_data = settle(horizon_data, HorizonCreditData::default(), "horizon", &mut notes);

    let merchant = subscriptions
        .first()
        .map(|s| s.merchant.as_str())
        .or_else(|| providers.first().map(String::as_str));
    let credit_score = match merchant {
        Some(merchant) => {
            let result = client.try_get_credit_score(user, merchant).await;
            settle(result, 0, "credit_score", &mut notes)
        }
        None => 0,
    };

    info!(
        user,
        subscriptions = subscriptions.len(),
        credit_score,
        notes = notes.len(),
        "overview loaded"
    );
    WalletOverview {
        subscriptions,
        credit_score,
        displayed_score: displayed_score(horizon_data.total_horizon_score),
        horizon: horizon_data,
        token_balance: from_smallest_unit(&RawAmount::Integer(balance)),
        debt,
        notes,
    }
}

// ============================================
// CACHE RECONCILIATION
// ============================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ReconcileStatus {
    /// Active on the ledger
    Confirmed,
    /// On the ledger but cancelled
    Inactive,
    /// No ledger record seen; the transaction may never have landed
    Unknown,
}

/// Match cached records against ledger subscriptions by provider
///
/// The ledger wins: a cached record is only `Confirmed` when an active
/// subscription with that merchant exists.
pub fn reconcile(
    cached: &[StoredSubscription],
    ledger: &[Subscription],
) -> Vec<(StoredSubscription, ReconcileStatus)> {
    cached
        .iter()
        .map(|stored| {
            let status = match ledger
                .iter()
                .find(|s| s.merchant == stored.provider_address)
            {
                Some(s) if s.is_active => ReconcileStatus::Confirmed,
                Some(_) => ReconcileStatus::Inactive,
                None => ReconcileStatus::Unknown,
            };
            debug!(id = %stored.id, ?status, "reconciled cache record");
            (stored.clone(), status)
        })
        .collect()
}
