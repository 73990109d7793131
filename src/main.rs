// Entry point of the ledger binary: inspects configuration, the bonus-block
// tables and the accepted state of a local chain.
use atomic_ledger::core::monetary::{format_subunits, to_native_subunits};
use atomic_ledger::core::{BonusBlocks, Engine, LocalChain};
use atomic_ledger::storage::SharedLedger;
use atomic_ledger::utils::current_timestamp;
use atomic_ledger::{Address, Command, Config, Opt};
use clap::Parser;
use log::{error, LevelFilter};
use serde_json::json;
use std::path::Path;
use std::process;
use std::sync::Arc;

fn main() {
    // Info level gives enough detail without being too verbose
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt.command, opt.config.as_deref()) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> atomic_ledger::Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    }
}

fn open_engine(config: Config) -> atomic_ledger::Result<Engine> {
    // nothing else shares memory with a standalone node
    let shared_memory = SharedLedger::new().chain(config.chain_id);
    Engine::open(config, Arc::new(shared_memory))
}

fn run_command(command: Command, config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::InitConfig { network, output } => {
            let config = Config {
                network,
                ..Config::default()
            };
            let text = config.to_toml_string()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text)?;
                    println!("Wrote {network} configuration to {}", path.display());
                }
                None => print!("{text}"),
            }
        }
        Command::BonusBlocks { network } => {
            let table = BonusBlocks::for_network(network)?;
            let entries: Vec<_> = table
                .entries()
                .into_iter()
                .map(|(height, id)| json!({ "height": height, "block_id": id.to_string() }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Command::RewardPreview { timestamp } => {
            let engine = open_engine(load_config(config_path)?)?;
            let timestamp = match timestamp {
                Some(timestamp) => timestamp,
                None => current_timestamp()?,
            };
            let preview = engine.reward_preview(timestamp)?;
            println!("{}", serde_json::to_string_pretty(&preview)?);
        }
        Command::Status => {
            let engine = open_engine(load_config(config_path)?)?;
            let last = engine.chain().last_accepted_block()?;
            let state = engine.accepted_state()?;
            let status = json!({
                "network": engine.config().network.to_string(),
                "chain_id": engine.config().chain_id.to_string(),
                "last_accepted": last.id().to_string(),
                "height": last.height(),
                "timestamp": last.timestamp(),
                "accounts": state.accounts().count(),
                "pending_txs": engine.mempool().len(),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Balance { address } => {
            let address: Address = address.parse()?;
            let engine = open_engine(load_config(config_path)?)?;
            let state = engine.accepted_state()?;
            let subunits = to_native_subunits(state.get_balance(&address), engine.config().x2c_rate);
            println!(
                "Balance of {address}: {} (nonce {}, head {})",
                format_subunits(subunits),
                state.get_nonce(&address),
                engine.chain().last_accepted()
            );
        }
    }
    Ok(())
}
