//! Self-hosted database adapter
//!
//! Drives the database chart with the same Helm runner the cluster
//! adapter uses and reads connection credentials back from the secret
//! the chart publishes.

use async_trait::async_trait;
use base64::Engine;
use tracing::info;

use crate::adapters::helm::HelmRunner;
use crate::adapters::DbCredentials;
use crate::errors::DeployError;
use crate::secrets::generate_password;

const DB_RELEASE: &str = "database";
const DB_CHART: &str = "oci://charts.skipper.sh/database";
const DB_AUTH_SECRET: &str = "database-auth";
const DB_PORT: u16 = 5432;

/// Helm-backed database operations, scoped to one namespace
pub struct HelmDatabase {
    runner: HelmRunner,
    namespace: String,
    database_name: String,
}

impl HelmDatabase {
    pub fn new(runner: HelmRunner, namespace: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            runner,
            namespace: namespace.into(),
            database_name: database_name.into(),
        }
    }

    fn host(&self) -> String {
        format!("{}.{}.svc.cluster.local", DB_RELEASE, self.namespace)
    }

    async fn secret_field(&self, key: &str) -> Result<Option<String>, DeployError> {
        let encoded = self
            .runner
            .kubectl(&[
                "get".to_string(),
                "secret".to_string(),
                DB_AUTH_SECRET.to_string(),
                "--namespace".to_string(),
                self.namespace.clone(),
                "--ignore-not-found".to_string(),
                "--output".to_string(),
                format!("jsonpath={{.data.{}}}", key),
            ])
            .await?;
        if encoded.is_empty() {
            return Ok(None);
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| DeployError::DatabaseError(format!("corrupt {} secret: {}", DB_AUTH_SECRET, e)))?;
        Ok(Some(String::from_utf8_lossy(&bytes).to_string()))
    }
}

#[async_trait]
impl crate::adapters::DatabaseOps for HelmDatabase {
    async fn deploy(&self, values: &serde_json::Value) -> Result<(), DeployError> {
        info!("Deploying database into {}", self.namespace);
        let path =
            std::env::temp_dir().join(format!("skipper-db-values-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, serde_json::to_vec_pretty(values)?).await?;
        let result = self
            .runner
            .helm(&[
                "upgrade".to_string(),
                "--install".to_string(),
                DB_RELEASE.to_string(),
                DB_CHART.to_string(),
                "--namespace".to_string(),
                self.namespace.clone(),
                "--create-namespace".to_string(),
                "--values".to_string(),
                path.display().to_string(),
                "--wait".to_string(),
            ])
            .await;
        let _ = tokio::fs::remove_file(&path).await;
        result.map(|_| ())
    }

    async fn migrate(&self) -> Result<(), DeployError> {
        info!("Running schema migrations");
        self.runner
            .kubectl(&[
                "exec".to_string(),
                format!("deploy/{}", DB_RELEASE),
                "--namespace".to_string(),
                self.namespace.clone(),
                "--".to_string(),
                "database-migrate".to_string(),
            ])
            .await
            .map(|_| ())
            .map_err(|e| DeployError::DatabaseError(format!("migrations failed: {}", e)))
    }

    async fn credentials(&self) -> Result<DbCredentials, DeployError> {
        let username = self
            .secret_field("username")
            .await?
            .unwrap_or_else(|| "app".to_string());
        let password = match self.secret_field("password").await? {
            Some(password) => password,
            None => {
                // First boot before the chart publishes auth: mint our own;
                // the caller persists it alongside the connection secret.
                info!("Minting initial database credentials");
                generate_password()
            }
        };

        Ok(DbCredentials {
            username,
            password,
            host: self.host(),
            port: DB_PORT,
            database: self.database_name.clone(),
        })
    }

    async fn is_deployed(&self) -> Result<bool, DeployError> {
        let releases = self
            .runner
            .helm(&[
                "list".to_string(),
                "--namespace".to_string(),
                self.namespace.clone(),
                "--filter".to_string(),
                format!("^{}$", DB_RELEASE),
                "--short".to_string(),
            ])
            .await?;
        Ok(releases.lines().any(|line| line.trim() == DB_RELEASE))
    }
}
