//! primecache - CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use primecache::app::App;
use primecache::cli::{commands, Cli, Commands};
use primecache::config::{Config, ConfigManager};
use primecache::error::PrimeResult;
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

async fn run() -> PrimeResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!(config = %config_manager.path().display(), "Loaded configuration");

    // Config command doesn't need the data directory
    if let Commands::Config(args) = cli.command {
        return commands::config(args, &config, &config_manager).await;
    }

    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| ConfigManager::data_dir(&config));
    let app = App::open(config, data_dir).await?;

    match cli.command {
        Commands::Submit(args) => commands::submit(args, &app).await,
        Commands::Status(args) => commands::status(args, &app).await,
        Commands::List(args) => commands::list(args, &app).await,
        Commands::Worker(args) => commands::worker(args, &app).await,
        Commands::Cache(args) => commands::cache(args, &app).await,
        Commands::Config(_) => unreachable!("Config handled above"),
    }
}

/// 0 = warn, 1 = info, 2+ = debug; `RUST_LOG` wins when set
fn init_logging(verbose: u8, config: &Config) {
    let default = match verbose {
        0 => "primecache=warn",
        1 => "primecache=info",
        _ => "primecache=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
