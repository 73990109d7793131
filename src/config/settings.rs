use crate::core::{Address, Id};
use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Ledger units per native subunit
pub const DEFAULT_X2C_RATE: u64 = 1_000_000_000;

const DEFAULT_NETWORK_ID: u32 = 12345;
const DEFAULT_ATOMIC_TX_FEE: u64 = 1_000;
const DEFAULT_MAX_EXT_DATA_SIZE: usize = 64 * 1024;
const DEFAULT_MEMPOOL_SIZE: usize = 4_096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    #[default]
    Local,
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "local" => Ok(Network::Local),
            _ => Err(format!(
                "Invalid network: {s}. Valid options: mainnet, testnet, local"
            )),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Local => write!(f, "local"),
        }
    }
}

/// Activation timestamps of rule-set transitions. `None` means never active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForkSchedule {
    pub batch_atomic_txs_time: Option<u64>,
    pub fee_market_time: Option<u64>,
    pub collect_rewards_time: Option<u64>,
}

impl Default for ForkSchedule {
    fn default() -> Self {
        Self {
            batch_atomic_txs_time: Some(0),
            fee_market_time: Some(0),
            collect_rewards_time: Some(0),
        }
    }
}

/// Rates and thresholds of the periodic reward distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub export_rate: u64,
    pub incentive_rate: u64,
    pub rate_denominator: u64,
    pub min_export_amount: u64,
    /// Seconds between two reward payouts
    pub interval: u64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            export_rate: 300_000,
            incentive_rate: 300_000,
            rate_denominator: 1_000_000,
            min_export_amount: 200_000,
            interval: 3_600,
        }
    }
}

impl RewardConfig {
    /// `amount * rate / denominator`, truncating
    pub fn apply_rate(&self, amount: u64, rate: u64) -> u64 {
        let scaled = amount as u128 * rate as u128 / self.rate_denominator as u128;
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }

    pub fn export_amount(&self, amount: u64) -> u64 {
        self.apply_rate(amount, self.export_rate)
    }

    pub fn incentive_amount(&self, amount: u64) -> u64 {
        self.apply_rate(amount, self.incentive_rate)
    }

    fn validate(&self) -> Result<()> {
        if self.rate_denominator == 0 {
            return Err(BlockchainError::Config(
                "reward rate denominator must be positive".to_string(),
            ));
        }
        let total = self.export_rate as u128 + self.incentive_rate as u128;
        if total == 0 || total > self.rate_denominator as u128 {
            return Err(BlockchainError::Config(format!(
                "reward rates must sum to (0, {}], got {total}",
                self.rate_denominator
            )));
        }
        if self.interval == 0 {
            return Err(BlockchainError::Config(
                "reward interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    pub max_size: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MEMPOOL_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub address: Address,
    /// Balance in native subunits; scaled by `x2c_rate` into ledger units
    pub balance: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    pub timestamp: u64,
    pub alloc: Vec<GenesisAccount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: Network,
    pub network_id: u32,
    pub chain_id: Id,
    pub platform_chain_id: Id,
    pub asset_id: Id,
    pub x2c_rate: u64,
    pub atomic_tx_fee: u64,
    pub max_ext_data_size: usize,
    pub data_dir: PathBuf,
    pub forks: ForkSchedule,
    pub rewards: RewardConfig,
    pub mempool: MempoolConfig,
    pub genesis: GenesisConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network::Local,
            network_id: DEFAULT_NETWORK_ID,
            chain_id: Id::hash_of(b"local-ledger-chain"),
            // the platform chain uses the empty id
            platform_chain_id: Id::EMPTY,
            asset_id: Id::hash_of(b"local-native-asset"),
            x2c_rate: DEFAULT_X2C_RATE,
            atomic_tx_fee: DEFAULT_ATOMIC_TX_FEE,
            max_ext_data_size: DEFAULT_MAX_EXT_DATA_SIZE,
            data_dir: PathBuf::from("data"),
            forks: ForkSchedule::default(),
            rewards: RewardConfig::default(),
            mempool: MempoolConfig::default(),
            genesis: GenesisConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Config> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BlockchainError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.x2c_rate == 0 {
            return Err(BlockchainError::Config(
                "x2c_rate must be positive".to_string(),
            ));
        }
        if self.chain_id == self.platform_chain_id {
            return Err(BlockchainError::Config(
                "chain_id must differ from platform_chain_id".to_string(),
            ));
        }
        self.rewards.validate()
    }
}
