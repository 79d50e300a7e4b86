use std::path::Path;

use alloy::primitives::{Address, U256, address};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Approval amount that marks "unlimited, already granted".
pub const UNLIMITED_ALLOWANCE: U256 = U256::MAX;

/// Flat gas limit for approve and migrate transactions.
pub const DEFAULT_GAS_LIMIT: u64 = 150_000;

/// Flat gas price (30 gwei).
pub const DEFAULT_GAS_PRICE: u128 = 30_000_000_000;

/// Env var holding the hex private key used by the live client.
pub const PRIVATE_KEY_ENV: &str = "MIGRATOR_PRIVATE_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("`{field}` must be non-zero")]
    Zero { field: &'static str },

    #[error("`{first}` and `{second}` point at the same contract {address}")]
    DuplicateAddress {
        first: &'static str,
        second: &'static str,
        address: Address,
    },
}

/// An ERC-20 token taking part in the migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TokenConfig {
    /// Ticker shown to the user (e.g. "FLIP").
    pub symbol: String,
    /// Token contract address.
    #[schemars(with = "String")]
    pub address: Address,
    /// Token decimals. Only used for display.
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

/// Migrator configuration.
///
/// Every field has a default matching the deployed FLIP → RYNO migrator on
/// POA core, so an empty JSON object is a valid config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MigratorConfig {
    /// EVM chain ID the wallet must be connected to.
    pub chain_id: u64,
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,
    /// Token being retired.
    pub old_token: TokenConfig,
    /// Token handed out 1:1 in exchange.
    pub new_token: TokenConfig,
    /// Migrator contract; also the spender approved on the old token.
    #[schemars(with = "String")]
    pub migrator: Address,
    /// Gas limit attached to every transaction.
    pub gas_limit: u64,
    /// Gas price in wei attached to every transaction.
    pub gas_price: u128,
}

fn default_decimals() -> u8 {
    18
}

impl Default for MigratorConfig {
    fn default() -> Self {
        MigratorConfig {
            chain_id: 99,
            rpc_url: "https://core.poa.network".into(),
            old_token: TokenConfig {
                symbol: "FLIP".into(),
                address: address!("b6505dEfE58759C09e0dF0739f8F5A6f32bffd44"),
                decimals: 18,
            },
            new_token: TokenConfig {
                symbol: "RYNO".into(),
                address: address!("C59615DA2DA226613B1C78F0c6676CAC497910bC"),
                decimals: 18,
            },
            migrator: address!("7B0C8a4df1eE89C9B6d7089F1a9517aB33E3E0aa"),
            gas_limit: DEFAULT_GAS_LIMIT,
            gas_price: DEFAULT_GAS_PRICE,
        }
    }
}

impl MigratorConfig {
    /// Load from a JSON file, or fall back to the defaults when no path is
    /// given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                serde_json::from_str(&contents)?
            }
            None => MigratorConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gas_limit == 0 {
            return Err(ConfigError::Zero { field: "gas_limit" });
        }
        if self.gas_price == 0 {
            return Err(ConfigError::Zero { field: "gas_price" });
        }

        let contracts = [
            ("old_token.address", self.old_token.address),
            ("new_token.address", self.new_token.address),
            ("migrator", self.migrator),
        ];
        for (i, &(first, a)) in contracts.iter().enumerate() {
            if a.is_zero() {
                return Err(ConfigError::Zero { field: first });
            }
            for &(second, b) in &contracts[i + 1..] {
                if a == b {
                    return Err(ConfigError::DuplicateAddress {
                        first,
                        second,
                        address: a,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment() {
        let config = MigratorConfig::default();
        assert_eq!(config.chain_id, 99);
        assert_eq!(config.gas_limit, 150_000);
        assert_eq!(config.gas_price, 30_000_000_000);
        assert_eq!(
            config.migrator,
            "0x7B0C8a4df1eE89C9B6d7089F1a9517aB33E3E0aa"
                .parse::<Address>()
                .unwrap()
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: MigratorConfig =
            serde_json::from_str(r#"{"rpc_url": "http://localhost:8545", "gas_limit": 200000}"#)
                .unwrap();
        assert_eq!(config.rpc_url, "http://localhost:8545");
        assert_eq!(config.gas_limit, 200_000);
        assert_eq!(config.old_token.symbol, "FLIP");
        assert_eq!(config.gas_price, DEFAULT_GAS_PRICE);
    }

    #[test]
    fn test_rejects_zero_gas() {
        let config = MigratorConfig {
            gas_price: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Zero { field: "gas_price" })
        ));
    }

    #[test]
    fn test_rejects_migrator_equal_to_token() {
        let mut config = MigratorConfig::default();
        config.migrator = config.old_token.address;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateAddress { .. })
        ));
    }
}
