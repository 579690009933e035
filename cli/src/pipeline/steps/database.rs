//! Database step: deploy, migrate, or record an external endpoint

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::cancel::CancelSignal;
use crate::config::DatabaseMode;
use crate::context::DeployContext;
use crate::errors::DeployError;
use crate::pipeline::{Step, StepOutcome};
use crate::values::addresses::PLATFORM_SUFFIX;
use crate::storage::state::DatabaseState;

/// Name under which the database password lives in the secrets store
pub const DB_PASSWORD_SECRET: &str = "database-password";

pub struct DatabaseStep;

impl DatabaseStep {
    async fn deploy_self_hosted(
        ctx: &DeployContext,
        _cancel: &CancelSignal,
    ) -> Result<(DatabaseState, StepOutcome), DeployError> {
        let db = ctx.database().await?;

        let outcome = if db.is_deployed().await? {
            info!("Database already deployed, skipping deploy");
            ctx.progress.step_skipped("database", "already deployed");
            StepOutcome::Unchanged
        } else {
            let values = json!({
                "persistence": { "enabled": true },
                "dashboard": { "host": format!("db.{}", ctx.config.project.domain) },
            });
            db.deploy(&values).await?;
            StepOutcome::Changed
        };

        db.migrate().await?;

        let creds = db.credentials().await?;
        ctx.secrets.set(DB_PASSWORD_SECRET, creds.password.clone()).await;

        // Hand credentials to the cluster as a secret; state only records
        // the secret's name
        let cluster = ctx.cluster().await?;
        let mut data = BTreeMap::new();
        data.insert("username".to_string(), creds.username.clone());
        data.insert("password".to_string(), creds.password.clone());
        cluster
            .apply_secret(
                &ctx.namespace(PLATFORM_SUFFIX),
                &ctx.database_secret_name(),
                &data,
            )
            .await?;

        Ok((
            DatabaseState {
                mode: "self-hosted".to_string(),
                connection_url: creds.redacted_url(),
                credentials_secret: DB_PASSWORD_SECRET.to_string(),
            },
            outcome,
        ))
    }

    async fn record_external(ctx: &DeployContext, mode: &str) -> Result<DatabaseState, DeployError> {
        let url = ctx.config.database.url.clone().ok_or_else(|| {
            DeployError::ConfigError(format!(
                "database.url is required when database.mode is '{}'",
                mode
            ))
        })?;

        if let Some(password_ref) = &ctx.config.database.password_ref {
            let password = ctx.secret(password_ref).await;
            ctx.secrets.set(DB_PASSWORD_SECRET, password).await;
        }

        Ok(DatabaseState {
            mode: mode.to_string(),
            connection_url: url,
            credentials_secret: DB_PASSWORD_SECRET.to_string(),
        })
    }
}

#[async_trait]
impl Step for DatabaseStep {
    fn name(&self) -> &'static str {
        "database"
    }

    fn description(&self) -> &'static str {
        "Deploy database and run migrations"
    }

    // Databases hold data; undo is a human decision, never automatic
    fn can_rollback(&self) -> bool {
        false
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(5 * 60)
    }

    async fn execute(
        &self,
        ctx: &DeployContext,
        cancel: &CancelSignal,
    ) -> Result<StepOutcome, DeployError> {
        let (section, outcome) = match ctx.config.database.mode {
            DatabaseMode::SelfHosted => Self::deploy_self_hosted(ctx, cancel).await?,
            DatabaseMode::External => {
                (Self::record_external(ctx, "external").await?, StepOutcome::Unchanged)
            }
            DatabaseMode::Managed => {
                (Self::record_external(ctx, "managed").await?, StepOutcome::Unchanged)
            }
        };

        let mut state = ctx.state.write().await;
        state.database = Some(section);
        Ok(outcome)
    }
}
