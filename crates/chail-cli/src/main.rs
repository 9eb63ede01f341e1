//! # chail
//!
//! Command-line front end of the chail probing engine.
//!
//! ## Usage
//!
//! ```bash
//! # Escalate from 1 to 20 clients, 5 requests per client
//! chail --clients 20 --iterations 5 https://api.example.com/health
//!
//! # POST a JSON payload with a custom CA and tracing enabled
//! chail -H "Content-Type: application/json" -d @payload.json --cacert ca.pem -v https://localhost:8443/items
//!
//! # Several targets, probed one after another
//! chail --clients 10 http://a.example http://b.example
//! ```

mod args;
mod form;
mod output;
mod request;

use std::sync::Arc;

use anyhow::{Context, Result};
use chail_engine::{ExchangeObserver, ProbeSweepController};
use clap::Parser;
use colored::Colorize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::args::Cli;
use crate::output::{TerminalReporter, VerbosePrinter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{}", format!("{:#}", e).red());
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout carries only the report
fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,chail={level},chail_engine={level}"))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.sweep_config()?;
    let specs = request::build_specs(&cli)?;

    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    println!("{}", format!("worker threads={}", threads).blue());
    info!(
        "chail v{}: {} target(s), up to {} clients",
        env!("CARGO_PKG_VERSION"),
        specs.len(),
        config.max_clients
    );

    let observer: Option<Arc<dyn ExchangeObserver>> = if config.verbose {
        Some(Arc::new(VerbosePrinter))
    } else {
        None
    };
    let controller = ProbeSweepController::from_config(config, observer)
        .context("preparing the sweep")?;

    let mut reporter = TerminalReporter::default();
    controller.run_targets(&specs, &mut reporter).await;
    Ok(())
}
