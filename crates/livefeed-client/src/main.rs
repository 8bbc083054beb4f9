//! livefeed CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use livefeed_client::cli::{Cli, Command, default_cache_settings_path};
use livefeed_client::error::ClientResult;
use livefeed_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default().with_level(Level::WARN)
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    // Run the command
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    match cli.command {
        Command::Watch(args) => livefeed_client::commands::watch::run(&args).await,
        Command::Avatar(args) => livefeed_client::commands::avatar::run(&args).await,
        Command::CachePath => {
            println!("cache settings: {}", default_cache_settings_path().display());
            Ok(())
        }
    }
}
