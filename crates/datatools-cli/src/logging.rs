use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging to stderr.
///
/// An explicit `--log-level` wins, then `RUST_LOG`, then the configured
/// filter.
pub fn init_logging(explicit: Option<&str>, configured: &str) -> Result<()> {
    let filter = match explicit {
        Some(level) => EnvFilter::try_new(level),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(configured)),
    }
    .with_context(|| format!("invalid log filter '{}'", explicit.unwrap_or(configured)))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("failed to install log subscriber")
}
