//! Shared logging utilities for Sluice binaries.
//!
//! Diagnostics go to stderr so the JSON report on stdout stays clean for
//! downstream tooling.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str =
    "sluice=info,sluice_scout=info,sluice_state=info,sluice_sinks=info";

/// Initialize tracing with a stderr layer. `RUST_LOG` overrides the default
/// filter; `verbose` widens it to debug.
pub fn init_logging(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(DEFAULT_LOG_FILTER)
        }
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialize logging: {err}"))?;

    Ok(())
}
