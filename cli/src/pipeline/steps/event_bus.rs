//! Event-streaming bus step

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::adapters::Component;
use crate::cancel::CancelSignal;
use crate::context::DeployContext;
use crate::errors::DeployError;
use crate::pipeline::{Step, StepOutcome};
use crate::values::event_bus::{event_bus_namespace, event_bus_values};

pub struct EventBusStep;

#[async_trait]
impl Step for EventBusStep {
    fn name(&self) -> &'static str {
        "event-bus"
    }

    fn description(&self) -> &'static str {
        "Install event-streaming bus"
    }

    fn can_rollback(&self) -> bool {
        true
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(6 * 60)
    }

    async fn execute(
        &self,
        ctx: &DeployContext,
        cancel: &CancelSignal,
    ) -> Result<StepOutcome, DeployError> {
        let cluster = ctx.cluster().await?;
        let namespace = event_bus_namespace(ctx.project());

        let outcome = if cluster.is_installed(Component::EventBus, &namespace).await? {
            info!("Event bus already installed, skipping install");
            ctx.progress.step_skipped("event-bus", "already installed");
            StepOutcome::Unchanged
        } else {
            let values = event_bus_values(&ctx.config);
            cluster
                .install(Component::EventBus, &namespace, &values)
                .await?;
            StepOutcome::Changed
        };

        cluster
            .wait_ready(Component::EventBus, &namespace, cancel)
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
            .uninstall(Component::EventBus, &event_bus_namespace(ctx.project()))
            .await
    }
}
