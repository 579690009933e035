//! Core services step: ingress and the autoscaling controller

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::adapters::Component;
use crate::cancel::CancelSignal;
use crate::context::DeployContext;
use crate::errors::DeployError;
use crate::pipeline::{Step, StepOutcome};
use crate::values::addresses::PLATFORM_SUFFIX;
use crate::values::tls;

pub struct CoreServicesStep;

#[async_trait]
impl Step for CoreServicesStep {
    fn name(&self) -> &'static str {
        "core-services"
    }

    fn description(&self) -> &'static str {
        "Install ingress and autoscaler"
    }

    fn can_rollback(&self) -> bool {
        true
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(4 * 60)
    }

    async fn execute(
        &self,
        ctx: &DeployContext,
        cancel: &CancelSignal,
    ) -> Result<StepOutcome, DeployError> {
        let cluster = ctx.cluster().await?;
        let namespace = ctx.namespace(PLATFORM_SUFFIX);

        let ingress_values = json!({
            "acme": {
                "email": ctx.config.security.acme_email,
            },
            "sans": tls::san_list(&ctx.config),
        });

        let mut installed_any = false;
        for (component, values) in [
            (Component::Ingress, ingress_values),
            (Component::Autoscaler, json!({})),
        ] {
            if cluster.is_installed(component, &namespace).await? {
                info!("{} already installed, skipping", component.as_str());
                ctx.progress
                    .step_skipped(component.as_str(), "already installed");
            } else {
                cluster.install(component, &namespace, &values).await?;
                installed_any = true;
            }
            cluster.wait_ready(component, &namespace, cancel).await?;
        }

        let endpoint = cluster.load_balancer_endpoint().await?;
        info!("Load balancer endpoint: {}", endpoint);

        let mut state = ctx.state.write().await;
        state.load_balancer_endpoint = Some(endpoint);
        Ok(if installed_any {
            StepOutcome::Changed
        } else {
            StepOutcome::Unchanged
        })
    }

    async fn rollback(
        &self,
        ctx: &DeployContext,
        _cancel: &CancelSignal,
    ) -> Result<(), DeployError> {
        let cluster = ctx.cluster().await?;
        let namespace = ctx.namespace(PLATFORM_SUFFIX);
        cluster.uninstall(Component::Autoscaler, &namespace).await?;
        cluster.uninstall(Component::Ingress, &namespace).await?;

        let mut state = ctx.state.write().await;
        state.load_balancer_endpoint = None;
        Ok(())
    }
}
