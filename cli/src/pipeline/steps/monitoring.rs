//! Monitoring step (optional)

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::adapters::Component;
use crate::cancel::CancelSignal;
use crate::config::MonitoringMode;
use crate::context::DeployContext;
use crate::errors::DeployError;
use crate::pipeline::{Step, StepOutcome};
use crate::storage::state::MonitoringState;
use crate::values::monitoring::{
    local_monitoring_values, monitoring_namespace, remote_write_body,
};

/// Name under which the dashboard admin password lives in the secrets store
pub const DASHBOARD_PASSWORD_SECRET: &str = "dashboard-password";

pub struct MonitoringStep;

#[async_trait]
impl Step for MonitoringStep {
    fn name(&self) -> &'static str {
        "monitoring"
    }

    fn description(&self) -> &'static str {
        "Install monitoring stack"
    }

    // A failed monitoring install degrades the deployment, it does not
    // abort it
    fn required(&self) -> bool {
        false
    }

    fn can_rollback(&self) -> bool {
        true
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(3 * 60)
    }

    async fn execute(
        &self,
        ctx: &DeployContext,
        cancel: &CancelSignal,
    ) -> Result<StepOutcome, DeployError> {
        if !ctx.config.monitoring.enabled() {
            info!("Monitoring disabled, skipping");
            ctx.progress.step_skipped("monitoring", "disabled");
            return Ok(StepOutcome::Unchanged);
        }

        let cluster = ctx.cluster().await?;
        let namespace = monitoring_namespace(ctx.project());

        let (values, section) = match ctx.config.monitoring.mode {
            MonitoringMode::Local => {
                // Generated once; re-runs keep addressing the same secret
                ctx.secrets.get_or_generate(DASHBOARD_PASSWORD_SECRET).await;
                let values = local_monitoring_values(&ctx.config, DASHBOARD_PASSWORD_SECRET);
                let section = MonitoringState {
                    enabled: true,
                    provider: "local".to_string(),
                    dashboard_url: Some(format!("https://metrics.{}", ctx.config.project.domain)),
                    credentials_secret: Some(DASHBOARD_PASSWORD_SECRET.to_string()),
                };
                (values, section)
            }
            MonitoringMode::Remote => {
                let remote = ctx.config.monitoring.remote.as_ref().ok_or_else(|| {
                    DeployError::ConfigError(
                        "monitoring.remote missing for remote mode".to_string(),
                    )
                })?;
                let body =
                    remote_write_body(remote, &ctx.config.cloud.region, &ctx.secrets).await;
                let values = json!({ "remoteWrite": [body] });
                let section = MonitoringState {
                    enabled: true,
                    provider: format!("{:?}", remote.provider).to_lowercase(),
                    dashboard_url: None,
                    credentials_secret: None,
                };
                (values, section)
            }
            MonitoringMode::Disabled => unreachable!("filtered above"),
        };

        let existed = cluster.is_installed(Component::Metrics, &namespace).await?;
        if existed {
            info!("Metrics stack already installed, upgrading in place");
        }
        cluster
            .install(Component::Metrics, &namespace, &values)
            .await?;
        cluster
            .wait_ready(Component::Metrics, &namespace, cancel)
            .await?;

        let mut state = ctx.state.write().await;
        state.monitoring = Some(section);
        // An in-place upgrade of a pre-existing release is not this run's
        // to uninstall
        Ok(if existed {
            StepOutcome::Unchanged
        } else {
            StepOutcome::Changed
        })
    }

    async fn rollback(
        &self,
        ctx: &DeployContext,
        _cancel: &CancelSignal,
    ) -> Result<(), DeployError> {
        let cluster = ctx.cluster().await?;
        cluster
            .uninstall(Component::Metrics, &monitoring_namespace(ctx.project()))
            .await?;

        let mut state = ctx.state.write().await;
        state.monitoring = None;
        Ok(())
    }
}
