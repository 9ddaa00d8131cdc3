//! Deplayer - cached dependency layers for container images
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use deplayer::cli::{Cli, Commands};
use deplayer::config::ConfigManager;
use deplayer::error::{DeplayerResult, ErrorKind};
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
            match e.kind() {
                ErrorKind::User => ExitCode::from(1),
                ErrorKind::Internal => ExitCode::from(2),
            }
        }
    }
}

async fn run() -> DeplayerResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("deplayer=warn"),
        1 => EnvFilter::new("deplayer=info"),
        _ => EnvFilter::new("deplayer=debug"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }
    debug!("Loaded configuration from {}", config_manager.path().display());

    match cli.command {
        Commands::Build(args) => deplayer::cli::commands::build(args, &config).await,
        Commands::Key(args) => deplayer::cli::commands::key(args, &config).await,
        Commands::Cache(args) => deplayer::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            deplayer::cli::commands::config(args, &config_manager, &config).await
        }
    }
}
