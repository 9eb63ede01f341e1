//! Error types for the chail probing engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that stop the engine before a sweep starts.
///
/// Failures of individual requests are never reported through this type;
/// they are absorbed by the executor and recorded as samples.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Structurally invalid sweep configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Request specification could not be turned into an HTTP request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// CA certificate could not be parsed
    #[error("Invalid CA certificate: {0}")]
    Certificate(String),

    /// HTTP client construction failed
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// Configuration file could not be loaded
    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] config::ConfigError),
}
