//! Email configuration step

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::cancel::CancelSignal;
use crate::context::DeployContext;
use crate::errors::DeployError;
use crate::pipeline::{Step, StepOutcome};
use crate::values::addresses::PLATFORM_SUFFIX;

pub struct EmailStep;

#[async_trait]
impl Step for EmailStep {
    fn name(&self) -> &'static str {
        "email"
    }

    fn description(&self) -> &'static str {
        "Configure transactional email"
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(30)
    }

    async fn execute(
        &self,
        ctx: &DeployContext,
        _cancel: &CancelSignal,
    ) -> Result<StepOutcome, DeployError> {
        let Some(email) = &ctx.config.email else {
            info!("Email not configured, skipping");
            ctx.progress.step_skipped("email", "not configured");
            return Ok(StepOutcome::Unchanged);
        };

        let password = ctx.secret(&email.smtp_password_ref).await;

        let mut data = BTreeMap::new();
        data.insert("provider".to_string(), email.provider.clone());
        data.insert("smtp-host".to_string(), email.smtp_host.clone());
        data.insert("smtp-port".to_string(), email.smtp_port.to_string());
        data.insert("smtp-username".to_string(), email.smtp_username.clone());
        data.insert("smtp-password".to_string(), password);
        data.insert("sender".to_string(), email.sender.clone());

        let cluster = ctx.cluster().await?;
        cluster
            .apply_secret(
                &ctx.namespace(PLATFORM_SUFFIX),
                &format!("{}-email", ctx.project()),
                &data,
            )
            .await?;
        Ok(StepOutcome::Changed)
    }
}
