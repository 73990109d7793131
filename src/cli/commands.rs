use crate::config::Network;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "atomic-ledger")]
pub struct Opt {
    #[arg(
        long,
        global = true,
        help = "TOML configuration file (defaults are used when omitted)"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "init-config", about = "Write a default configuration file")]
    InitConfig {
        #[arg(long, default_value = "local", help = "mainnet, testnet or local")]
        network: Network,
        #[arg(long, help = "Where to write the file (stdout when omitted)")]
        output: Option<PathBuf>,
    },
    #[command(name = "bonus-blocks", about = "List the bonus blocks of a network")]
    BonusBlocks {
        #[arg(long, default_value = "mainnet", help = "mainnet, testnet or local")]
        network: Network,
    },
    #[command(
        name = "reward-preview",
        about = "Show what the reward trigger sees on the accepted state"
    )]
    RewardPreview {
        #[arg(long, help = "Block timestamp to evaluate at (now when omitted)")]
        timestamp: Option<u64>,
    },
    #[command(name = "status", about = "Show the last accepted block and ledger totals")]
    Status,
    #[command(name = "balance", about = "Show the accepted balance of an address")]
    Balance {
        #[arg(help = "0x-prefixed account address")]
        address: String,
    },
}
