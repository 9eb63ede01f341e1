//! Shared HTTP client construction

use reqwest::{Certificate, Client};
use tracing::debug;

use crate::config::{ClientSettings, TlsPolicy};
use crate::error::{EngineError, Result};

/// Build the one HTTP client used by every worker of every level.
///
/// The pool ceiling must already cover the highest concurrency level of
/// the sweep; the client is never rebuilt between levels.
pub fn build_client(settings: &ClientSettings) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(settings.timeout)
        .connect_timeout(settings.timeout)
        .pool_max_idle_per_host(settings.pool_size)
        .tls_built_in_root_certs(trusts_built_in_roots(&settings.tls));

    builder = match &settings.tls {
        TlsPolicy::System => builder,
        TlsPolicy::CustomCa { pem } => {
            let cert = Certificate::from_pem(pem.as_bytes())
                .map_err(|e| EngineError::Certificate(e.to_string()))?;
            builder.add_root_certificate(cert)
        }
        TlsPolicy::Insecure => builder.danger_accept_invalid_certs(true),
    };

    debug!(
        "Built HTTP client: timeout={:?}, pool_size={}, tls={:?}",
        settings.timeout,
        settings.pool_size,
        tls_mode(&settings.tls)
    );

    Ok(builder.build()?)
}

/// An explicit CA replaces the built-in root store instead of extending it
fn trusts_built_in_roots(policy: &TlsPolicy) -> bool {
    !matches!(policy, TlsPolicy::CustomCa { .. })
}

fn tls_mode(policy: &TlsPolicy) -> &'static str {
    match policy {
        TlsPolicy::System => "system",
        TlsPolicy::CustomCa { .. } => "custom-ca",
        TlsPolicy::Insecure => "insecure",
    }
}
