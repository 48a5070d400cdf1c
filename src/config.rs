//! Configuration of the dashboard.
//!
//! Read from a JSON file; every value may reference environment variables
//! as `$VAR` or `${VAR}`:
//!
//! ```json
//! {
//!   "chain_id": 300,
//!   "rpc": [{ "http": "$ZKSYNC_RPC_URL", "rate_limit": 20 }],
//!   "signer": "$SIGNER_PRIVATE_KEY",
//!   "contracts": {
//!     "manager_factory": "$MANAGER_FACTORY",
//!     "account_factory": "$ACCOUNT_FACTORY",
//!     "price_feed": "$PRICE_FEED"
//!   },
//!   "explorer_url": "https://sepolia.explorer.zksync.io"
//! }
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use subdash_types::amount::AmountError;
use subdash_types::config::{ContractsConfig, EvmPrivateKey, LiteralOrEnv, RpcConfig};
use subdash_types::sponsorship::SponsorshipGate;
use subdash_zksync::{ContractAddresses, ZkSyncConfig};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    chain_id: LiteralOrEnv<u64>,
    rpc: Vec<RpcConfig>,
    signer: LiteralOrEnv<EvmPrivateKey>,
    contracts: ContractsConfig,
    #[serde(default = "config_defaults::default_receipt_timeout_secs")]
    receipt_timeout_secs: u64,
    #[serde(default = "config_defaults::default_gas_per_pubdata")]
    gas_per_pubdata: u64,
    #[serde(default)]
    sponsorship: SponsorshipConfig,
    #[serde(default)]
    explorer_url: Option<LiteralOrEnv<Url>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SponsorshipConfig {
    /// Minimum sponsor balance in ETH for calls to go the sponsored path.
    #[serde(default = "config_defaults::default_min_balance")]
    min_balance: String,
}

impl Default for SponsorshipConfig {
    fn default() -> Self {
        Self {
            min_balance: config_defaults::default_min_balance(),
        }
    }
}

pub mod config_defaults {
    use subdash_types::sponsorship::DEFAULT_MIN_SPONSOR_BALANCE;

    pub const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 60;
    pub const DEFAULT_GAS_PER_PUBDATA: u64 = 50_000;

    pub fn default_receipt_timeout_secs() -> u64 {
        DEFAULT_RECEIPT_TIMEOUT_SECS
    }

    pub fn default_gas_per_pubdata() -> u64 {
        DEFAULT_GAS_PER_PUBDATA
    }

    pub fn default_min_balance() -> String {
        DEFAULT_MIN_SPONSOR_BALANCE.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("Invalid sponsorship.min_balance: {0}")]
    MinBalance(#[source] AmountError),
    #[error("At least one rpc endpoint is required")]
    NoRpc,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let path = path
            .canonicalize()
            .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::FileRead(path, e))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content)?;
        if config.rpc.is_empty() {
            return Err(ConfigError::NoRpc);
        }
        config.sponsorship_gate()?;
        Ok(config)
    }

    pub fn chain_id(&self) -> u64 {
        *self.chain_id
    }

    pub fn rpc(&self) -> &[RpcConfig] {
        &self.rpc
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn explorer_url(&self) -> Option<&Url> {
        self.explorer_url.as_ref().map(|url| url.inner())
    }

    pub fn zksync(&self) -> ZkSyncConfig {
        ZkSyncConfig {
            receipt_timeout: self.receipt_timeout(),
            gas_per_pubdata: self.gas_per_pubdata,
            ..ZkSyncConfig::new(self.chain_id(), self.rpc.clone(), *self.signer.inner())
        }
    }

    pub fn contracts(&self) -> ContractAddresses {
        ContractAddresses {
            manager_factory: *self.contracts.manager_factory,
            account_factory: *self.contracts.account_factory,
            price_feed: *self.contracts.price_feed,
        }
    }

    pub fn sponsorship_gate(&self) -> Result<SponsorshipGate, ConfigError> {
        SponsorshipGate::from_eth(&self.sponsorship.min_balance).map_err(ConfigError::MinBalance)
    }
}
