use std::{env, fs, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use stellar_xdr::curr::ScAddress;

use crate::error::{ClientError, Result};

// ============================================
// NETWORK DEFAULTS (testnet deployment)
// ============================================

pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";
pub const TESTNET_RPC_URL: &str = "https://soroban-testnet.stellar.org";
pub const TESTNET_HORIZON_URL: &str = "https://horizon-testnet.stellar.org";

/// Deployed SoroSub contract
pub const SOROSUB_CONTRACT_ID: &str = "CC72ORKR3TVSIZ7TOFMNTKPJJ77IL6NMQAWBWQBIBRNIHEJARBWZRBQJ";
/// USDC token contract used for payments
pub const USDC_TOKEN_ID: &str = "CBIELTK6YBZJU5UP2WWQEUCYKLPU6AUNZ2BQ4WWFEIE3USCIHMXQDAMA";
/// Admin account, also the liquidity pool funding BNPL
pub const ADMIN_ADDRESS: &str = "GDFYJUIWYT63JQW4YCIMJTHOTHRE4W4OAUUO6JZB3PDGCQZBQGUAOJHX";
/// Source for simulations that have no natural caller
pub const SIMULATION_ADDRESS: &str = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF";

// ============================================
// FEES & VALIDITY WINDOWS
// ============================================

pub const WRITE_BASE_FEE: u32 = 100_000; // stroops
pub const READ_BASE_FEE: u32 = 100;
pub const WRITE_TIMEOUT_SECS: u64 = 300;
pub const READ_TIMEOUT_SECS: u64 = 30;

/// Approximate ledger close time
pub const LEDGER_CLOSE_SECS: u32 = 5;

// ============================================
// SUBSCRIPTION INTERVAL PRESETS (seconds)
// ============================================

pub const WEEKLY: u64 = 7 * 24 * 60 * 60;
pub const MONTHLY: u64 = 30 * 24 * 60 * 60;
pub const YEARLY: u64 = 365 * 24 * 60 * 60;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub network_passphrase: String,
    pub rpc_url: String,
    pub horizon_url: String,
    pub contract_id: String,
    pub token_id: String,
    /// Source account for `is_initialized` / `get_liquidity_pool` simulations
    pub simulation_source: String,
    pub write_fee: u32,
    pub read_fee: u32,
    /// Merchants to scan when listing a user's subscriptions
    pub known_providers: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::testnet()
    }
}

impl NetworkConfig {
    pub fn testnet() -> Self {
        Self {
            network_passphrase: TESTNET_PASSPHRASE.to_string(),
            rpc_url: TESTNET_RPC_URL.to_string(),
            horizon_url: TESTNET_HORIZON_URL.to_string(),
            contract_id: SOROSUB_CONTRACT_ID.to_string(),
            token_id: USDC_TOKEN_ID.to_string(),
            simulation_source: SIMULATION_ADDRESS.to_string(),
            write_fee: WRITE_BASE_FEE,
            read_fee: READ_BASE_FEE,
            known_providers: vec![ADMIN_ADDRESS.to_string()],
            request_timeout_secs: 30,
        }
    }

    /// Testnet defaults overridden by `SOROSUB_*` environment variables
    ///
    /// # Errors
    /// - `Config`: an overridden contract or token id is not a valid strkey
    pub fn from_env() -> Result<Self> {
        let mut config = Self::testnet();
        config.apply_env(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file; missing keys keep their testnet defaults
    ///
    /// # Errors
    /// - `Io`: file cannot be read
    /// - `Config`: TOML is malformed or an id is invalid
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.as_ref().display())))?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let overrides: [(&str, &mut String); 5] = [
            ("SOROSUB_RPC_URL", &mut self.rpc_url),
            ("SOROSUB_HORIZON_URL", &mut self.horizon_url),
            ("SOROSUB_NETWORK_PASSPHRASE", &mut self.network_passphrase),
            ("SOROSUB_CONTRACT_ID", &mut self.contract_id),
            ("SOROSUB_TOKEN_ID", &mut self.token_id),
        ];
        for (key, slot) in overrides {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = value.trim().to_string();
            }
        }
    }

    /// Check that every configured identifier parses as a strkey
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("contract_id", &self.contract_id),
            ("token_id", &self.token_id),
            ("simulation_source", &self.simulation_source),
        ] {
            ScAddress::from_str(value)
                .map_err(|_| ClientError::Config(format!("{field} is not a valid address: {value}")))?;
        }
        if self.rpc_url.is_empty() || self.horizon_url.is_empty() {
            return Err(ClientError::Config("endpoint urls must be set".into()));
        }
        Ok(())
    }
}

/// Shorten an address for display: `GABC...WXYZ`
pub fn format_address(address: &str, chars: usize) -> String {
    let len = address.chars().count();
    if len <= chars * 2 {
        return address.to_string();
    }
    let head: String = address.chars().take(chars).collect();
    let tail: String = address.chars().skip(len - chars).collect();
    format!("{head}...{tail}")
}

/// Human label for an interval in seconds
pub fn interval_label(seconds: u64) -> String {
    match seconds {
        WEEKLY => "weekly".to_string(),
        MONTHLY => "monthly".to_string(),
        YEARLY => "yearly".to_string(),
        s if s % 86_400 == 0 => format!("every {} days", s / 86_400),
        s => format!("every {s}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_testnet_defaults_are_valid() {
        let config = NetworkConfig::testnet();
        assert!(config.validate().is_ok());
        assert_eq!(config.write_fee, 100_000);
        assert_eq!(config.read_fee, 100);
    }

    #[test]
    fn test_env_overrides_only_set_keys() {
        let vars: HashMap<&str, &str> = [
            ("SOROSUB_RPC_URL", "http://localhost:8000/soroban/rpc"),
            ("SOROSUB_TOKEN_ID", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = NetworkConfig::testnet();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.rpc_url, "http://localhost:8000/soroban/rpc");
        // Blank values are ignored
        assert_eq!(config.token_id, USDC_TOKEN_ID);
        assert_eq!(config.horizon_url, TESTNET_HORIZON_URL);
    }

    #[test]
    fn test_invalid_contract_id_rejected() {
        let config = NetworkConfig {
            contract_id: "not-a-contract".into(),
            ..NetworkConfig::testnet()
        };
        assert!(matches!(config.validate(), Err(ClientError::Config(_))));
    }

    #[test]
    fn test_from_file_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sorosub.toml");
        fs::write(
            &path,
            "rpc_url = \"http://127.0.0.1:8000\"\nwrite_fee = 200000\n",
        )
        .unwrap();

        let config = NetworkConfig::from_file(&path).unwrap();
        assert_eq!(config.rpc_url, "http://127.0.0.1:8000");
        assert_eq!(config.write_fee, 200_000);
        assert_eq!(config.contract_id, SOROSUB_CONTRACT_ID);
    }

    #[test]
    fn test_format_address() {
        assert_eq!(format_address(ADMIN_ADDRESS, 4), "GDFY...OJHX");
        assert_eq!(format_address("GABC", 4), "GABC");
    }

    #[test]
    fn test_format_address_counts_chars_not_bytes() {
        assert_eq!(format_address("aéééééé", 2), "aé...éé");
        assert_eq!(format_address("ééééé", 2), "éé...éé");
        assert_eq!(format_address("éééé", 2), "éééé");
    }

    #[test]
    fn test_interval_label() {
        assert_eq!(interval_label(WEEKLY), "weekly");
        assert_eq!(interval_label(MONTHLY), "monthly");
        assert_eq!(interval_label(2 * 86_400), "every 2 days");
        assert_eq!(interval_label(90), "every 90s");
    }
}
