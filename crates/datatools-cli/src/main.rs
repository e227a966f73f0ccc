//! Data Tools permissions CLI

mod commands;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::{Commands, Context};
use datatools_core::AppConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "datatools-perms")]
#[command(about = "Validate and query Data Tools permission grants")]
#[command(version)]
struct Cli {
    /// Set logging level (defaults to RUST_LOG, then the configured filter)
    #[arg(short = 'l', long, global = true)]
    log_level: Option<LogLevel>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Organization/project catalog (JSON)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?.with_env_overrides(),
        None => AppConfig::load_with_env()?,
    };

    logging::init_logging(
        cli.log_level.as_ref().map(LogLevel::as_filter),
        &config.logging.filter,
    )?;

    info!("Starting datatools-perms v{}", env!("CARGO_PKG_VERSION"));

    let catalog = cli
        .catalog
        .or_else(|| config.catalog.path.clone())
        .map(|path| commands::load_catalog(&path))
        .transpose()?
        .map(Arc::new);

    let ctx = Context { config, catalog };

    match cli.command.execute(&ctx) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {e:#}");
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}
