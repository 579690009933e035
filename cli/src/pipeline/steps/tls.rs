//! TLS configuration step
//!
//! Applies the certificate configuration to the ingress, waits for ACME
//! issuance, then verifies the primary domain serves a hostname-valid
//! certificate. For self-hosted databases a shorter secondary check runs
//! against the database subdomain; its timeout is a warning only.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::adapters::Component;
use crate::cancel::CancelSignal;
use crate::context::DeployContext;
use crate::errors::DeployError;
use crate::pipeline::{Step, StepOutcome};
use crate::readiness::certificate::{wait_for_issuance, CERTIFICATE_ISSUANCE};
use crate::readiness::https::{
    wait_for_https, HttpsProbe, TlsProbe, HTTPS_PRIMARY, HTTPS_SECONDARY,
};
use crate::readiness::PollSpec;
use crate::values::addresses::PLATFORM_SUFFIX;
use crate::values::tls::tls_values;

pub struct TlsStep {
    probe: Arc<dyn HttpsProbe>,
    issuance_spec: PollSpec,
    primary_spec: PollSpec,
    secondary_spec: PollSpec,
}

impl TlsStep {
    /// Custom probe and budgets, for tests
    pub fn with_probe(
        probe: Arc<dyn HttpsProbe>,
        issuance_spec: PollSpec,
        primary_spec: PollSpec,
        secondary_spec: PollSpec,
    ) -> Self {
        Self {
            probe,
            issuance_spec,
            primary_spec,
            secondary_spec,
        }
    }
}

impl Default for TlsStep {
    fn default() -> Self {
        Self {
            probe: Arc::new(TlsProbe::new()),
            issuance_spec: CERTIFICATE_ISSUANCE,
            primary_spec: HTTPS_PRIMARY,
            secondary_spec: HTTPS_SECONDARY,
        }
    }
}

#[async_trait]
impl Step for TlsStep {
    fn name(&self) -> &'static str {
        "tls-configuration"
    }

    fn description(&self) -> &'static str {
        "Configure TLS and verify certificates"
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(8 * 60)
    }

    async fn execute(
        &self,
        ctx: &DeployContext,
        cancel: &CancelSignal,
    ) -> Result<StepOutcome, DeployError> {
        let cluster = ctx.cluster().await?;
        let namespace = ctx.namespace(PLATFORM_SUFFIX);

        // Re-apply the certificate configuration; the ingress treats this
        // as an idempotent upgrade
        let values = tls_values(&ctx.config);
        cluster
            .install(Component::Ingress, &namespace, &values)
            .await?;

        let size = wait_for_issuance(&self.issuance_spec, &cluster, cancel).await?;
        info!("ACME store populated ({} bytes)", size);

        let domain = ctx.config.project.domain.clone();
        wait_for_https(&self.primary_spec, &self.probe, &domain, cancel).await?;
        info!("Certificate for {} verified", domain);

        if ctx.config.database.is_self_hosted() {
            let db_domain = format!("db.{}", domain);
            match wait_for_https(&self.secondary_spec, &self.probe, &db_domain, cancel).await {
                Ok(()) => info!("Certificate for {} verified", db_domain),
                Err(DeployError::Cancelled) => return Err(DeployError::Cancelled),
                Err(e) => {
                    // The primary domain is the hard requirement
                    warn!("Database subdomain TLS not verified: {}", e);
                    ctx.progress
                        .warn(&format!("{} is not serving a valid certificate yet", db_domain));
                }
            }
        }

        Ok(StepOutcome::Changed)
    }
}
