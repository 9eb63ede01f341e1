//! Sweep configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Prefix for environment variables layered over a configuration file
pub const ENV_PREFIX: &str = "CHAIL";

/// TLS trust policy for the shared HTTP client
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TlsPolicy {
    /// Trust the built-in root store
    #[default]
    System,
    /// Trust an explicit CA certificate (PEM)
    CustomCa { pem: String },
    /// Skip certificate verification entirely
    Insecure,
}

/// Complete sweep configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Highest concurrency level reached by the sweep
    #[serde(default = "default_one")]
    pub max_clients: usize,

    /// Sequential requests issued by every client
    #[serde(default = "default_one")]
    pub repeats: usize,

    /// Accepted latency growth per concurrency step
    #[serde(default = "default_gradient")]
    pub accepted_gradient: f64,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// TLS trust policy
    #[serde(default)]
    pub tls: TlsPolicy,

    /// Trace every exchange
    #[serde(default)]
    pub verbose: bool,
}

fn default_one() -> usize {
    1
}

fn default_gradient() -> f64 {
    1.1
}

fn default_timeout_ms() -> u64 {
    1_000
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            max_clients: default_one(),
            repeats: default_one(),
            accepted_gradient: default_gradient(),
            timeout_ms: default_timeout_ms(),
            tls: TlsPolicy::default(),
            verbose: false,
        }
    }
}

impl SweepConfig {
    /// Load configuration from a file, with `CHAIL_*` environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        Ok(config)
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject configurations no sweep can run with
    pub fn validate(&self) -> Result<()> {
        if self.max_clients < 1 {
            return Err(EngineError::InvalidConfig(
                "max_clients must be at least 1".to_string(),
            ));
        }
        if self.repeats < 1 {
            return Err(EngineError::InvalidConfig(
                "repeats must be at least 1".to_string(),
            ));
        }
        if !self.accepted_gradient.is_finite() || self.accepted_gradient <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "accepted_gradient must be a positive number, got {}",
                self.accepted_gradient
            )));
        }
        if self.timeout_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings for the HTTP client shared by the whole sweep
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            timeout: self.timeout(),
            tls: self.tls.clone(),
            pool_size: self.max_clients,
        }
    }
}

/// Settings the shared HTTP client is built from, once per run
#[derive(Clone, Debug)]
pub struct ClientSettings {
    /// Connect and response timeout for every request
    pub timeout: Duration,
    /// Trust policy
    pub tls: TlsPolicy,
    /// Connection pool ceiling per host; at least the maximum concurrency level
    pub pool_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SweepConfig::default();
        assert_eq!(config.max_clients, 1);
        assert_eq!(config.repeats, 1);
        assert_eq!(config.accepted_gradient, 1.1);
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert_eq!(config.tls, TlsPolicy::System);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_clients() {
        let config = SweepConfig {
            max_clients: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_gradient() {
        for gradient in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = SweepConfig {
                accepted_gradient: gradient,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "gradient {} accepted", gradient);
        }
    }

    #[test]
    fn test_validate_rejects_zero_repeats_and_timeout() {
        let config = SweepConfig {
            repeats: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SweepConfig {
            timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_client_settings_pool_covers_sweep() {
        let config = SweepConfig {
            max_clients: 25,
            timeout_ms: 2_500,
            tls: TlsPolicy::Insecure,
            ..Default::default()
        };
        let settings = config.client_settings();
        assert_eq!(settings.pool_size, 25);
        assert_eq!(settings.timeout, Duration::from_millis(2_500));
        assert_eq!(settings.tls, TlsPolicy::Insecure);
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "max_clients = 12\nrepeats = 3\naccepted_gradient = 1.25\n\n[tls]\nmode = \"insecure\""
        )
        .unwrap();

        let config = SweepConfig::load(file.path()).unwrap();
        assert_eq!(config.max_clients, 12);
        assert_eq!(config.repeats, 3);
        assert_eq!(config.accepted_gradient, 1.25);
        assert_eq!(config.timeout_ms, 1_000);
        assert_eq!(config.tls, TlsPolicy::Insecure);
    }

    #[test]
    fn test_load_missing_file() {
        let result = SweepConfig::load(Path::new("/nonexistent/chail.toml"));
        assert!(matches!(result, Err(EngineError::ConfigFile(_))));
    }
}
