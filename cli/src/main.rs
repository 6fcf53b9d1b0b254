//! ledgerindex CLI: replay ledger files and rewind accounts.
//!
//! Usage:
//! ```bash
//! ledgerindex replay ledger.json
//! ledgerindex rewind ledger.json <address> <round> --config engine.json
//! ledgerindex info
//! ```

use std::env;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ledgerindex_accounting::{preload, RoundAccountant, Rewinder, SpecialAccounts};
use ledgerindex_core::config::{EngineConfig, LogConfig};
use ledgerindex_core::types::Address;
use ledgerindex_core::updates::{RoundContext, RoundUpdates};
use ledgerindex_storage::{InMemoryStore, LedgerFile};

#[tokio::main]
async fn main() {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let config = match take_config(&mut args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    };
    if args.is_empty() {
        print_usage();
        process::exit(1);
    }

    let result = match args[0].as_str() {
        "info" => {
            cmd_info(&config);
            Ok(())
        }
        "replay" => cmd_replay(&args[1..], &config).await,
        "rewind" => cmd_rewind(&args[1..], &config).await,
        "version" | "--version" | "-V" => {
            println!("ledgerindex {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("ledgerindex {}", env!("CARGO_PKG_VERSION"));
    println!("Round accounting and historical account rewind\n");
    println!("USAGE:");
    println!("    ledgerindex [--config <engine.json>] <COMMAND>\n");
    println!("COMMANDS:");
    println!("    replay <ledger.json>                    Account every round, print the updates");
    println!("    rewind <ledger.json> <address> <round>  Print an account as of an earlier round");
    println!("    info                                    Show engine configuration");
    println!("    version                                 Print version");
    println!("    help                                    Print this help");
}

fn cmd_info(config: &EngineConfig) {
    println!("LedgerIndex v{}", env!("CARGO_PKG_VERSION"));
    println!("  Stream buffer: {} rows", config.stream_buffer);
    match config.max_rewind_rounds {
        Some(limit) => println!("  Rewind limit: {limit} rounds"),
        None => println!("  Rewind limit: none"),
    }
    println!("  Log filter: {}", config.log.directives());
    println!("  Storage backends: memory");
}

/// Remove `--config <path>` from `args` and load it, or fall back to defaults.
fn take_config(args: &mut Vec<String>) -> anyhow::Result<EngineConfig> {
    let Some(pos) = args.iter().position(|a| a == "--config") else {
        return Ok(EngineConfig::default());
    };
    if pos + 1 >= args.len() {
        bail!("--config needs a path");
    }
    let path = args.remove(pos + 1);
    args.remove(pos);
    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    EngineConfig::from_json(&raw).with_context(|| format!("parsing {path}"))
}

fn init_tracing(config: &LogConfig) {
    let filter =
        EnvFilter::try_new(config.directives()).unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so stdout stays machine-readable.
    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Index and account every round of the ledger file.
///
/// Each round's dependencies are preloaded against the store as a dry run:
/// the in-memory store needs no warm-up, so the result is only checked and
/// logged. `on_round` sees each round's updates before they are applied.
async fn replay_ledger(
    ledger: &LedgerFile,
    config: &EngineConfig,
    mut on_round: impl FnMut(&RoundUpdates) -> anyhow::Result<()>,
) -> anyhow::Result<InMemoryStore> {
    let store = InMemoryStore::with_config(ledger.special, config);
    for block in &ledger.rounds {
        let loaded = preload(&block.txns, &store)
            .await
            .with_context(|| format!("preloading round {}", block.round))?;
        tracing::debug!(
            round = block.round,
            accounts = loaded.accounts.addresses.len(),
            asset_creators = loaded.asset_creators.len(),
            app_creators = loaded.app_creators.len(),
            "Dependencies resolved (dry run)"
        );

        store.import_round(block.round, block.round_time(), &block.txns);

        let mut accountant = RoundAccountant::new(
            RoundContext {
                round: block.round,
                fee_sink: ledger.special.fee_sink,
                rewards_pool: ledger.special.rewards_pool,
                rewards_level: block.rewards_level,
            },
            store.default_frozen(),
        );
        accountant.add_payset(&block.txns);
        let updates = accountant.finish();
        on_round(&updates)?;
        store.apply_round(&updates);
    }
    tracing::info!(
        rounds = ledger.rounds.len(),
        last_round = ledger.last_round(),
        "Ledger replayed"
    );
    Ok(store)
}

async fn cmd_replay(args: &[String], config: &EngineConfig) -> anyhow::Result<()> {
    let [path] = args else {
        bail!("usage: ledgerindex replay <ledger.json>");
    };
    init_tracing(&config.log);

    let ledger = LedgerFile::load(path).with_context(|| format!("loading {path}"))?;
    replay_ledger(&ledger, config, |updates| {
        println!("{}", serde_json::to_string(updates)?);
        Ok(())
    })
    .await?;
    Ok(())
}

async fn cmd_rewind(args: &[String], config: &EngineConfig) -> anyhow::Result<()> {
    let [path, address, round] = args else {
        bail!("usage: ledgerindex rewind <ledger.json> <address> <round>");
    };
    let address: Address = address.parse()?;
    let round: u64 = round
        .parse()
        .with_context(|| format!("invalid round '{round}'"))?;
    init_tracing(&config.log);

    let ledger = LedgerFile::load(path).with_context(|| format!("loading {path}"))?;
    let store = Arc::new(replay_ledger(&ledger, config, |_| Ok(())).await?);
    let Some(account) = store.account(&address) else {
        bail!("account {address} not found");
    };

    let rewinder = Rewinder::with_specials(
        store.clone(),
        SpecialAccounts::resolved(ledger.special),
        config,
    );
    let cancel = CancellationToken::new();
    let rewound = rewinder
        .account_at_round(&cancel, &account, round)
        .await
        .with_context(|| format!("rewinding {address} to round {round}"))?;

    println!("{}", serde_json::to_string_pretty(&rewound)?);
    Ok(())
}
