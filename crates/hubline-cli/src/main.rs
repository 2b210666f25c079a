//! hubline - incremental HubSpot CRM pulls into BigQuery
//!
//! Pulls each configured CRM object collection page by page, loads the
//! records into a warehouse table, and persists a per-resource watermark so
//! the next run only fetches what changed.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "hubline")]
#[command(about = "Incremental HubSpot to BigQuery loader")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ./hubline.toml or ~/.config/hubline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Pull every configured resource into the warehouse
    Run(cmd::run::RunArgs),
    /// Show persisted pull state
    State(cmd::state::StateArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(hubline_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, spinner lines show activity
    //   non-TTY: info unless --quiet or --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = cli.quiet || (is_tty && !cli.debug);
    hubline_core::init_logging(quiet, cli.debug, multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Run(args) => cmd::run::run(args, &config, &progress),
        Command::State(args) => cmd::state::run(args, &config).map(|()| ExitCode::SUCCESS),
        Command::Config => {
            cmd::show_config(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}
