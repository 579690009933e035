//! Application workload step

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::adapters::Component;
use crate::cancel::CancelSignal;
use crate::context::DeployContext;
use crate::errors::DeployError;
use crate::pipeline::{Step, StepOutcome};
use crate::storage::state::ApplicationState;
use crate::values::application::{app_namespace, application_values, replicas};

pub struct ApplicationStep {
    version: String,
}

impl ApplicationStep {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
        }
    }
}

#[async_trait]
impl Step for ApplicationStep {
    fn name(&self) -> &'static str {
        "application"
    }

    fn description(&self) -> &'static str {
        "Deploy application workload"
    }

    fn can_rollback(&self) -> bool {
        true
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(5 * 60)
    }

    async fn execute(
        &self,
        ctx: &DeployContext,
        cancel: &CancelSignal,
    ) -> Result<StepOutcome, DeployError> {
        let cluster = ctx.cluster().await?;
        let namespace = app_namespace(ctx.project());
        let broker = ctx.broker_address();

        // Inputs computed by earlier steps, read back from state
        let (database_url, database_secret) = {
            let state = ctx.state.read().await;
            let db = state.database.as_ref().ok_or_else(|| {
                DeployError::StateError(
                    "application step requires a completed database section".to_string(),
                )
            })?;
            (db.connection_url.clone(), ctx.database_secret_name())
        };

        {
            let state = ctx.state.read().await;
            if let Some(app) = &state.application {
                if app.deployed
                    && app.version == self.version
                    && cluster.is_installed(Component::Application, &namespace).await?
                {
                    info!("Application {} already deployed, skipping", self.version);
                    ctx.progress
                        .step_skipped("application", "already deployed at this version");
                    return Ok(StepOutcome::Unchanged);
                }
            }
        }

        let values = application_values(
            &ctx.config,
            &self.version,
            &broker,
            &database_url,
            &database_secret,
        );
        cluster
            .install(Component::Application, &namespace, &values)
            .await?;
        cluster
            .wait_ready(Component::Application, &namespace, cancel)
            .await?;

        let mut state = ctx.state.write().await;
        state.application = Some(ApplicationState {
            deployed: true,
            version: self.version.clone(),
            replicas: replicas(&ctx.config),
            broker_address: broker,
            endpoint: format!("https://{}", ctx.config.project.domain),
        });
        Ok(StepOutcome::Changed)
    }

    async fn rollback(
        &self,
        ctx: &DeployContext,
        _cancel: &CancelSignal,
    ) -> Result<(), DeployError> {
        let cluster = ctx.cluster().await?;
        cluster
            .uninstall(Component::Application, &app_namespace(ctx.project()))
            .await?;

        let mut state = ctx.state.write().await;
        state.application = None;
        Ok(())
    }
}
