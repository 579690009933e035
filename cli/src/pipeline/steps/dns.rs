//! DNS verification step

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::cancel::CancelSignal;
use crate::context::DeployContext;
use crate::errors::DeployError;
use crate::pipeline::{Step, StepOutcome};
use crate::readiness::dns::{default_resolvers, wait_for_propagation, DnsResolver, DNS_PROPAGATION};
use crate::readiness::PollSpec;
use crate::values::tls::san_list;

pub struct DnsVerificationStep {
    interactive: bool,
    spec: PollSpec,
    resolvers: Vec<Arc<dyn DnsResolver>>,
}

impl DnsVerificationStep {
    pub fn new(interactive: bool) -> Self {
        Self {
            interactive,
            spec: DNS_PROPAGATION,
            resolvers: default_resolvers(),
        }
    }

    /// Custom resolvers and budget, for tests
    pub fn with_resolvers(
        interactive: bool,
        spec: PollSpec,
        resolvers: Vec<Arc<dyn DnsResolver>>,
    ) -> Self {
        Self {
            interactive,
            spec,
            resolvers,
        }
    }

    async fn confirm_continue(&self) -> bool {
        if !self.interactive {
            return false;
        }
        tokio::task::spawn_blocking(|| {
            inquire::Confirm::new("DNS has not fully propagated. Continue anyway?")
                .with_default(false)
                .prompt()
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false)
    }
}

#[async_trait]
impl Step for DnsVerificationStep {
    fn name(&self) -> &'static str {
        "dns-verification"
    }

    fn description(&self) -> &'static str {
        "Verify DNS propagation"
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(10 * 60)
    }

    async fn execute(
        &self,
        ctx: &DeployContext,
        cancel: &CancelSignal,
    ) -> Result<StepOutcome, DeployError> {
        let expected = {
            let state = ctx.state.read().await;
            state.load_balancer_endpoint.clone().ok_or_else(|| {
                DeployError::StateError(
                    "DNS verification requires a recorded load-balancer endpoint".to_string(),
                )
            })?
        };

        let domains = san_list(&ctx.config);
        info!(
            "Verifying DNS propagation of {} domain(s) towards {}",
            domains.len(),
            expected
        );

        let outcome =
            wait_for_propagation(&self.spec, &domains, &expected, &self.resolvers, cancel).await?;

        // Pure verification; there is never anything to undo
        if !outcome.timed_out() {
            return Ok(StepOutcome::Unchanged);
        }

        // Per-domain status report before deciding how to proceed
        for line in outcome.report_lines() {
            ctx.progress.info(&line);
        }

        if self.confirm_continue().await {
            warn!("Continuing with unpropagated domains: {:?}", outcome.unresolved);
            ctx.progress
                .warn("continuing without full DNS propagation; TLS issuance may be delayed");
            return Ok(StepOutcome::Unchanged);
        }

        Err(DeployError::Timeout {
            what: format!("DNS propagation of {}", outcome.unresolved.join(", ")),
            attempts: self.spec.max_attempts,
        })
    }
}
