//! dircache - Remote cache for build directories
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use dircache::cli::{commands, Cli, Commands};
use dircache::config::{Config, ConfigManager};
use dircache::error::DircacheResult;
use std::process::ExitCode;
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

async fn run() -> DircacheResult<()> {
    let cli = Cli::parse();

    // Completions must not print anything besides the script
    if let Commands::Completions { shell } = cli.command {
        return commands::completions(shell);
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    dircache::ui::init_theme();

    match cli.command {
        Commands::Completions { .. } => unreachable!("Completions handled above"),
        Commands::Auth(args) => commands::auth(args, &config).await,
        Commands::StoreFs(args) => commands::store(args, &config).await,
        Commands::LoadFs(args) => commands::load(args, &config).await,
        Commands::FsExists(args) => commands::exists(args, &config).await,
        Commands::CachedFs(args) => commands::cached(args, &config).await,
        Commands::Config(args) => commands::config(args, &config_manager, &config).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; RUST_LOG overrides
fn init_logging(verbose: u8, config: &Config) {
    let default = match verbose {
        0 => "dircache=warn",
        1 => "dircache=info",
        _ => "dircache=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
