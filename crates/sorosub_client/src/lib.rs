//! Off-chain client for the SoroSub subscription / BNPL contract on Stellar
//! Soroban.
//!
//! Builds prepared contract transactions, submits signed envelopes, runs
//! read-only simulations and computes the Horizon credit heuristic. Signing
//! is delegated to a [`wallet::WalletProvider`].

pub mod amount;
pub mod cache;
pub mod config;
pub mod credit;
pub mod dashboard;
pub mod envelope;
pub mod error;
pub mod flows;
pub mod horizon;
pub mod rpc;
pub mod scval;
pub mod sorosub;
pub mod submit;
pub mod types;
pub mod wallet;

pub use config::NetworkConfig;
pub use error::{ClientError, Result};
pub use sorosub::SoroSub;
pub use types::{Subscription, UserDebt};
