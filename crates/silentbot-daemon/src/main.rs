//! SilentBot: curation bot daemon for a Hive community.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use silentbot_chain::{HiveClient, Retrying, Signer};
use silentbot_core::{BotConfig, Credentials, DataPaths};
use silentbot_runtime::{Checkpoint, CheckpointStore, CurationBot, DailyTally};

/// Human-readable lines describing a checkpoint.
fn describe(checkpoint: &Checkpoint) -> Vec<String> {
    let mut lines = vec![format!("Next block: {}", checkpoint.cursor.next())];
    for (account, queues) in &checkpoint.queues {
        lines.push(format!(
            "  {}: {} curated ({:.2}% outstanding), {} opportunistic, last vote {}",
            account,
            queues.primary.len(),
            queues.primary.outstanding_pct(),
            queues.opportunistic.len(),
            queues.last_vote
        ));
    }
    let state = &checkpoint.eligibility;
    lines.push(format!(
        "Eligibility: {} blacklisted, {} spammers, {} tag abusers, {} notified non-curators",
        state.blacklist.len(),
        state.spammers.len(),
        state.tag_abuse.len(),
        state.notified_non_curators.len()
    ));
    let tally = &checkpoint.tally;
    if let Some(day) = tally.day {
        lines.push(format!(
            "Tally for {}: stars 5={} 4={} 3={} 2={} 1={}",
            day,
            tally.star_count(5),
            tally.star_count(4),
            tally.star_count(3),
            tally.star_count(2),
            tally.star_count(1)
        ));
        for (account, votes) in &tally.accounts {
            lines.push(format!(
                "  {}: {} votes, {:.2}% spent",
                account,
                votes.votes.len(),
                votes.spent_pct()
            ));
        }
    }
    lines
}

fn print_help() {
    println!("SilentBot: community curation bot");
    println!();
    println!("Usage: silentbot [command]");
    println!();
    println!("Commands:");
    println!("  (none) | run             Follow the chain and curate");
    println!("  validate [config-file]   Check the configuration and keys");
    println!("  status                   Print the saved checkpoint");
    println!("  help                     Show this help message");
    println!();
    println!("Environment:");
    println!("  SILENTBOT_DATA_DIR       Data directory (default: data)");
    println!("  SILENTBOT_CONFIG         Configuration file (default: <data>/silentbot.json)");
    println!("  SILENTBOT_NODE           RPC node overriding the configured one");
    println!("  <ACCOUNT>_WIF            Posting key of each voting account");
}

fn validate(config_file: PathBuf) -> anyhow::Result<()> {
    let config = BotConfig::load(&config_file)?;
    let credentials = Credentials::from_env(&config.voting_accounts())?;
    Signer::from_credentials(&credentials)?;
    println!(
        "{}: ok (bot @{}, accounts {})",
        config_file.display(),
        config.bot,
        config.voting_accounts().join(", ")
    );
    Ok(())
}

fn status(paths: &DataPaths) -> anyhow::Result<()> {
    let store = CheckpointStore::new(&paths.checkpoint_file);
    match store.load()? {
        Some(checkpoint) => {
            for line in describe(&checkpoint) {
                println!("{}", line);
            }
        }
        None => println!("No checkpoint at {}", paths.checkpoint_file.display()),
    }
    Ok(())
}

async fn run(paths: DataPaths) -> anyhow::Result<()> {
    info!("Data directory: {}", paths.root.display());

    let config = BotConfig::load(&paths.config_file)?;
    let credentials = Credentials::from_env(&config.voting_accounts())?;
    let signer = Signer::from_credentials(&credentials)?;

    let client = HiveClient::new(&config.node, signer)?;
    info!("Using node {}", client.node());
    let ledger = Retrying::new(client, Duration::from_secs(config.retry_delay_secs));

    let tally = Arc::new(DailyTally::new());
    let store = CheckpointStore::new(&paths.checkpoint_file);

    let mut bot = CurationBot::start(config, ledger, tally, store).await?;
    bot.run(async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let paths = DataPaths::from_env()?;

    match args.get(1).map(String::as_str) {
        None | Some("run") => run(paths).await,
        Some("--validate") | Some("validate") => {
            let file = args
                .get(2)
                .map(PathBuf::from)
                .unwrap_or_else(|| paths.config_file.clone());
            validate(file)
        }
        Some("status") => status(&paths),
        Some("--help") | Some("-h") | Some("help") => {
            print_help();
            Ok(())
        }
        Some(other) => {
            eprintln!("Unknown command: {}. Use 'silentbot help' for usage.", other);
            std::process::exit(1);
        }
    }
}
