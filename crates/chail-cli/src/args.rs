//! Command-line arguments

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chail_engine::{SweepConfig, TlsPolicy};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "chail")]
#[command(version)]
#[command(
    about = "Probe HTTP endpoints with a growing number of concurrent clients",
    long_about = "Runs 1, 2, ... N concurrent clients against each URL and flags the \
                  concurrency level where response time grows faster than linearly."
)]
pub struct Cli {
    /// Target URLs, probed one after another
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Number of clients
    #[arg(long, value_name = "N")]
    pub clients: Option<usize>,

    /// Number of successive requests for every client
    #[arg(long, value_name = "N")]
    pub iterations: Option<usize>,

    /// Accepted gradient of expected linear function
    #[arg(long, value_name = "M")]
    pub gradient: Option<f64>,

    /// Maximum time allowed for a request (e.g. 500ms, 2s, 1m30s)
    #[arg(long = "connect-timeout", value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub connect_timeout: Option<Duration>,

    /// TLS connections without certs
    #[arg(short = 'k', long)]
    pub insecure: bool,

    /// CA certificate file (PEM)
    #[arg(long, value_name = "FILE")]
    pub cacert: Option<PathBuf>,

    /// Request command to use (GET, POST, ...)
    #[arg(short = 'X', long = "command", value_name = "METHOD", default_value = "GET")]
    pub method: String,

    /// Custom http header line
    #[arg(short = 'H', long = "header", value_name = "LINE")]
    pub headers: Vec<String>,

    /// Post data; filenames are prefixed with @
    #[arg(short = 'd', long, value_name = "DATA", conflicts_with = "form")]
    pub data: Option<String>,

    /// Multipart POST data; filenames are prefixed with @, e.g. <name>=@<path/to/file>;type=<override content-type>
    #[arg(short = 'F', long = "form", value_name = "PART")]
    pub form: Vec<String>,

    /// No color output
    #[arg(long)]
    pub no_color: bool,

    /// Trace every request and response
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(long, value_name = "FILE", env = "CHAIL_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Sweep settings: configuration file first, explicit flags on top
    pub fn sweep_config(&self) -> Result<SweepConfig> {
        let mut config = match &self.config {
            Some(path) => SweepConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => SweepConfig::default(),
        };

        if let Some(clients) = self.clients {
            config.max_clients = clients;
        }
        if let Some(iterations) = self.iterations {
            config.repeats = iterations;
        }
        if let Some(gradient) = self.gradient {
            config.accepted_gradient = gradient;
        }
        if let Some(timeout) = self.connect_timeout {
            config.timeout_ms = timeout_ms(timeout);
        }
        if self.insecure {
            config.tls = TlsPolicy::Insecure;
        }
        // An explicit CA takes precedence over --insecure
        if let Some(path) = &self.cacert {
            let pem = std::fs::read_to_string(path)
                .with_context(|| format!("reading CA certificate {}", path.display()))?;
            config.tls = TlsPolicy::CustomCa { pem };
        }
        config.verbose |= self.verbose;

        config.validate()?;
        Ok(config)
    }
}

/// Whole milliseconds, rounding any sub-millisecond remainder up
fn timeout_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}
