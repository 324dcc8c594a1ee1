//! offcache - adaptive offline asset cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use offcache::cli::{Cli, Commands};
use offcache::config::ConfigManager;
use offcache::error::OffcacheResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> OffcacheResult<()> {
    let cli = Cli::parse();

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    let mut config = config_manager.load().await?;
    if let Some(ref store) = cli.store {
        config.store.path = Some(store.clone());
    }

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("offcache=warn"),
        1 => EnvFilter::new("offcache=info"),
        _ => EnvFilter::new("offcache=debug"),
    };

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }

    debug!("Using config {}", config_manager.path().display());

    match cli.command {
        Commands::Install(args) => offcache::cli::commands::install(args, &config).await,
        Commands::Fetch(args) => offcache::cli::commands::fetch(args, &config).await,
        Commands::Info(args) => offcache::cli::commands::info(args, &config).await,
        Commands::Message(args) => offcache::cli::commands::message(args, &config).await,
        Commands::Inject(args) => offcache::cli::commands::inject(args, &config).await,
        Commands::Config(args) => {
            offcache::cli::commands::config(args, &config, &config_manager).await
        }
    }
}
