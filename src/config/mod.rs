//! Configuration management
//!
//! Node configuration is an immutable [`Config`] value loaded once at startup
//! (from TOML or defaults) and lent to every component that needs it.

pub mod settings;

pub use settings::{
    Config, ForkSchedule, GenesisAccount, GenesisConfig, MempoolConfig, Network, RewardConfig,
    DEFAULT_X2C_RATE,
};
