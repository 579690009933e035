//! Infrastructure step: provision the Kubernetes cluster

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::adapters::{ClusterInfo, ClusterSpec};
use crate::cancel::CancelSignal;
use crate::context::DeployContext;
use crate::errors::DeployError;
use crate::pipeline::{Step, StepOutcome};
use crate::storage::state::InfrastructureState;

pub struct InfrastructureStep;

impl InfrastructureStep {
    fn spec(ctx: &DeployContext) -> ClusterSpec {
        ClusterSpec {
            name: ctx.cluster_name(),
            provider: ctx.config.cloud.provider.as_str().to_string(),
            region: ctx.config.cloud.region.clone(),
            tier: ctx.config.cloud.tier.clone(),
            node_count: ctx.config.cluster.node_count,
            node_size: ctx.config.cluster.node_size.clone(),
        }
    }

    async fn record(ctx: &DeployContext, info: &ClusterInfo) {
        let mut state = ctx.state.write().await;
        if state.infrastructure.is_none() {
            state.infrastructure = Some(InfrastructureState {
                provider: ctx.config.cloud.provider.as_str().to_string(),
                region: ctx.config.cloud.region.clone(),
                cluster_name: info.name.clone(),
                endpoint: info.endpoint.clone(),
                node_count: info.node_count,
                created_at: Utc::now(),
            });
        }
    }
}

#[async_trait]
impl Step for InfrastructureStep {
    fn name(&self) -> &'static str {
        "infrastructure"
    }

    fn description(&self) -> &'static str {
        "Provision Kubernetes cluster"
    }

    fn can_rollback(&self) -> bool {
        true
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(15 * 60)
    }

    async fn execute(
        &self,
        ctx: &DeployContext,
        cancel: &CancelSignal,
    ) -> Result<StepOutcome, DeployError> {
        let infra = ctx.infra();

        // Re-runs against a provisioned target must not duplicate the cluster
        let (info, outcome) = match infra.describe_cluster().await? {
            Some(existing) => {
                info!("Cluster '{}' already exists, reusing", existing.name);
                ctx.progress
                    .step_skipped("cluster provisioning", "already exists");
                (existing, StepOutcome::Unchanged)
            }
            None => {
                let info = infra.create_cluster(&Self::spec(ctx)).await?;
                infra.wait_ready(cancel).await?;
                (info, StepOutcome::Changed)
            }
        };

        ctx.attach_cluster(&info).await;
        Self::record(ctx, &info).await;
        Ok(outcome)
    }

    async fn rollback(
        &self,
        ctx: &DeployContext,
        _cancel: &CancelSignal,
    ) -> Result<(), DeployError> {
        ctx.infra().destroy_cluster().await?;
        let mut state = ctx.state.write().await;
        state.scrub_infrastructure();
        Ok(())
    }
}
