//! HTTPS verification state machine
//!
//! Success means a completed TLS handshake whose leaf certificate validates
//! for the exact target hostname. The probe rides on the HTTP client's
//! certificate verification: a response (any status) proves the handshake
//! and hostname check passed, while connection errors mean not ready yet.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::cancel::CancelSignal;
use crate::errors::DeployError;
use crate::readiness::{poll, PollSpec};

/// Primary domain verification; timeout is fatal
pub const HTTPS_PRIMARY: PollSpec = PollSpec {
    max_attempts: 30,
    interval_secs: 10,
    first_interval_secs: 10,
};

/// Self-hosted database subdomain verification; timeout is a warning
pub const HTTPS_SECONDARY: PollSpec = PollSpec {
    max_attempts: 12,
    interval_secs: 10,
    first_interval_secs: 10,
};

/// One TLS verification attempt against a domain
#[async_trait]
pub trait HttpsProbe: Send + Sync {
    async fn verify(&self, domain: &str) -> Result<(), DeployError>;
}

/// Probe backed by an HTTPS-only client with default (strict) verification
pub struct TlsProbe {
    client: reqwest::Client,
}

impl TlsProbe {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .https_only(true)
            .timeout(Duration::from_secs(8))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for TlsProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpsProbe for TlsProbe {
    async fn verify(&self, domain: &str) -> Result<(), DeployError> {
        let url = format!("https://{}/", domain);
        // Any HTTP status is fine; only the handshake matters here
        self.client.head(&url).send().await?;
        Ok(())
    }
}

/// Wait until `domain` serves a hostname-valid certificate
pub async fn wait_for_https(
    spec: &PollSpec,
    probe: &Arc<dyn HttpsProbe>,
    domain: &str,
    cancel: &CancelSignal,
) -> Result<(), DeployError> {
    let what = format!("https://{}", domain);
    poll(spec, cancel, &what, |attempt| {
        let probe = probe.clone();
        let domain = domain.to_string();
        async move {
            match probe.verify(&domain).await {
                Ok(()) => Ok(Some(())),
                Err(e) => {
                    debug!("HTTPS attempt {} for {} failed: {}", attempt, domain, e);
                    Ok(None)
                }
            }
        }
    })
    .await
}
