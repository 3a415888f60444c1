//! Sluice command-line entry point.

use anyhow::Result;
use clap::Parser;
use sluice::{runner, Cli, Config};
use sluice_sinks::{FsSink, Sink};
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = sluice_logging::init_logging(cli.verbose) {
        eprintln!("error: {err:#}");
        return ExitCode::FAILURE;
    }
    info!("sluice version={}", env!("CARGO_PKG_VERSION"));

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("fatal: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let cfg = Config::from_cli(cli)?;

    let sink = cfg.dest.as_ref().map(|dest| {
        let sink = FsSink::new(dest, cfg.file_concurrency);
        match &cfg.meta {
            Some(meta) => sink.with_meta_namespace(&meta.namespace),
            None => sink,
        }
    });

    let mut stdout = std::io::stdout().lock();
    runner::run(
        &cfg,
        sink.as_ref().map(|sink| sink as &dyn Sink),
        &mut stdout,
    )?;
    Ok(())
}
