//! Command-line entry point for scout_sync.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scout_sync::config::{Settings, DEFAULT_CONFIG_PATH};
use scout_sync::file_mover::FileMover;
use scout_sync::{logging, HttpStatusFeed, Synchronizer, TcpControlLink};
use std::path::PathBuf;
use tracing::info;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "scout_sync", version, about = "Synchronize scouting data taking with the facility run state")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start and stop the scouting DAQ according to the status feed
    Sync,
    /// Compress completed scouting files out of the source directory
    MoveFiles,
    /// Load and validate the configuration, then print it as JSON
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    if let Command::CheckConfig = cli.command {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    logging::init(&settings.log).context("Failed to initialize logging")?;

    match cli.command {
        Command::Sync => {
            let feed = HttpStatusFeed::new(&settings.status_feed)
                .context("Failed to create status feed client")?;
            let link = TcpControlLink::new(&settings.peer);
            info!(feed = %feed.url(), peer = %link.addr(), "Synchronizing scouting run state");

            let mut synchronizer = Synchronizer::new(feed, link, &settings.sync);
            tokio::select! {
                _ = synchronizer.run() => {}
                _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
            }
        }
        Command::MoveFiles => {
            let mover = FileMover::new(settings.file_mover.clone());
            tokio::select! {
                _ = mover.run() => {}
                _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
            }
        }
        Command::CheckConfig => {}
    }

    Ok(())
}
