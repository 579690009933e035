//! Log shipping step (optional)

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::adapters::Component;
use crate::cancel::CancelSignal;
use crate::context::DeployContext;
use crate::errors::DeployError;
use crate::pipeline::{Step, StepOutcome};
use crate::values::addresses::OBSERVABILITY_SUFFIX;
use crate::values::logging::log_shipper_values;

pub struct LoggingStep;

#[async_trait]
impl Step for LoggingStep {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn description(&self) -> &'static str {
        "Install log shipper"
    }

    fn required(&self) -> bool {
        false
    }

    fn can_rollback(&self) -> bool {
        true
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(2 * 60)
    }

    async fn execute(
        &self,
        ctx: &DeployContext,
        cancel: &CancelSignal,
    ) -> Result<StepOutcome, DeployError> {
        let Some(logging) = &ctx.config.logging else {
            info!("Log shipping not configured, skipping");
            ctx.progress.step_skipped("logging", "not configured");
            return Ok(StepOutcome::Unchanged);
        };

        let cluster = ctx.cluster().await?;
        let namespace = ctx.namespace(OBSERVABILITY_SUFFIX);

        let outcome = if cluster
            .is_installed(Component::LogShipper, &namespace)
            .await?
        {
            info!("Log shipper already installed, skipping");
            ctx.progress.step_skipped("logging", "already installed");
            StepOutcome::Unchanged
        } else {
            let values = log_shipper_values(logging, &ctx.secrets).await;
            cluster
                .install(Component::LogShipper, &namespace, &values)
                .await?;
            StepOutcome::Changed
        };
        cluster
            .wait_ready(Component::LogShipper, &namespace, cancel)
            .await?;
        Ok(outcome)
    }

    async fn rollback(
        &self,
        ctx: &DeployContext,
        _cancel: &CancelSignal,
    ) -> Result<(), DeployError> {
        let cluster = ctx.cluster().await?;
        cluster
            .uninstall(Component::LogShipper, &ctx.namespace(OBSERVABILITY_SUFFIX))
            .await
    }
}
