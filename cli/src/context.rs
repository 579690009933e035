//! Deployment context
//!
//! The mutable aggregate every step operates on: configuration, cumulative
//! state, the secrets store, the progress sink, and handles to the
//! operation adapters. The cluster and database adapters are attached
//! lazily; they only exist once infrastructure has yielded a live endpoint.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::adapters::{ClusterInfo, ClusterOps, DatabaseOps, InfraOps};
use crate::config::DeployConfig;
use crate::errors::DeployError;
use crate::progress::Progress;
use crate::secrets::Secrets;
use crate::storage::layout::StorageLayout;
use crate::storage::state::DeployState;
use crate::values::addresses;

/// Builds a cluster adapter once the cluster endpoint is known
pub type ClusterOpsFactory =
    Box<dyn Fn(&ClusterInfo) -> Arc<dyn ClusterOps> + Send + Sync>;

/// Builds a database adapter on top of a live cluster adapter
pub type DatabaseOpsFactory =
    Box<dyn Fn(Arc<dyn ClusterOps>) -> Arc<dyn DatabaseOps> + Send + Sync>;

/// Shared deployment context
pub struct DeployContext {
    pub config: DeployConfig,
    pub layout: StorageLayout,
    pub state: RwLock<DeployState>,
    pub secrets: Secrets,
    pub progress: Progress,

    infra: Arc<dyn InfraOps>,
    cluster: RwLock<Option<Arc<dyn ClusterOps>>>,
    database: RwLock<Option<Arc<dyn DatabaseOps>>>,
    cluster_factory: ClusterOpsFactory,
    database_factory: DatabaseOpsFactory,
}

impl DeployContext {
    /// Create a context with an empty state document
    pub fn new(
        config: DeployConfig,
        layout: StorageLayout,
        infra: Arc<dyn InfraOps>,
        cluster_factory: ClusterOpsFactory,
        database_factory: DatabaseOpsFactory,
    ) -> Self {
        Self {
            config,
            layout,
            state: RwLock::new(DeployState::default()),
            secrets: Secrets::new(),
            progress: Progress::new(),
            infra,
            cluster: RwLock::new(None),
            database: RwLock::new(None),
            cluster_factory,
            database_factory,
        }
    }

    /// Replace the state document, typically with one loaded from disk
    pub async fn restore_state(&self, state: DeployState) {
        *self.state.write().await = state;
    }

    /// Use a silent progress reporter (tests, machine-driven runs)
    pub fn with_silent_progress(mut self) -> Self {
        self.progress = Progress::silent();
        self
    }

    /// Persist the current state document to durable storage
    pub async fn save(&self) -> Result<(), DeployError> {
        let state = self.state.read().await;
        state.save(&self.layout.state_file()).await
    }

    /// Resolve a secret reference (literal, `env:`, or `file:` form)
    pub async fn secret(&self, reference: &str) -> String {
        self.secrets.resolve(reference).await
    }

    /// The infrastructure adapter
    pub fn infra(&self) -> Arc<dyn InfraOps> {
        self.infra.clone()
    }

    /// Attach the cluster adapter for a freshly provisioned cluster
    pub async fn attach_cluster(&self, info: &ClusterInfo) -> Arc<dyn ClusterOps> {
        debug!("Attaching cluster adapter for endpoint {}", info.endpoint);
        let ops = (self.cluster_factory)(info);
        *self.cluster.write().await = Some(ops.clone());
        ops
    }

    /// The cluster adapter; errors when infrastructure has not completed
    pub async fn cluster(&self) -> Result<Arc<dyn ClusterOps>, DeployError> {
        self.cluster.read().await.clone().ok_or_else(|| {
            DeployError::Internal(
                "cluster adapter requested before infrastructure completed".to_string(),
            )
        })
    }

    /// The database adapter, constructed on first use
    pub async fn database(&self) -> Result<Arc<dyn DatabaseOps>, DeployError> {
        if let Some(db) = self.database.read().await.clone() {
            return Ok(db);
        }
        let cluster = self.cluster().await?;
        let db = (self.database_factory)(cluster);
        *self.database.write().await = Some(db.clone());
        Ok(db)
    }

    // ---- deterministic naming helpers -------------------------------------

    /// Project name
    pub fn project(&self) -> &str {
        &self.config.project.name
    }

    /// Namespace for a subsystem suffix
    pub fn namespace(&self, suffix: &str) -> String {
        addresses::namespace(self.project(), suffix)
    }

    /// Cluster name derived from project identity
    pub fn cluster_name(&self) -> String {
        format!("{}-cluster", self.project())
    }

    /// Broker address of the event-streaming bus
    pub fn broker_address(&self) -> String {
        addresses::broker_address(self.project())
    }

    /// Name of the in-cluster secret holding database credentials
    pub fn database_secret_name(&self) -> String {
        format!("{}-db-credentials", self.project())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ClusterSpec;
    use crate::cancel::CancelSignal;
    use async_trait::async_trait;

    struct NoInfra;

    #[async_trait]
    impl InfraOps for NoInfra {
        async fn create_cluster(&self, _spec: &ClusterSpec) -> Result<ClusterInfo, DeployError> {
            Err(DeployError::Internal("unused".to_string()))
        }
        async fn destroy_cluster(&self) -> Result<(), DeployError> {
            Ok(())
        }
        async fn wait_ready(&self, _cancel: &CancelSignal) -> Result<(), DeployError> {
            Ok(())
        }
        async fn describe_cluster(&self) -> Result<Option<ClusterInfo>, DeployError> {
            Ok(None)
        }
    }

    fn context() -> DeployContext {
        let config = DeployConfig {
            project: crate::config::ProjectConfig {
                name: "acme".to_string(),
                domain: "acme.example.com".to_string(),
            },
            ..Default::default()
        };
        DeployContext::new(
            config,
            StorageLayout::new("/tmp/skipper-test"),
            Arc::new(NoInfra),
            Box::new(|_| unreachable!("no cluster factory in this test")),
            Box::new(|_| unreachable!("no database factory in this test")),
        )
        .with_silent_progress()
    }

    #[test]
    fn test_naming_helpers_are_deterministic() {
        let ctx = context();
        assert_eq!(ctx.cluster_name(), "acme-cluster");
        assert_eq!(ctx.namespace("execution"), "acme-execution");
        assert_eq!(
            ctx.broker_address(),
            "kafka.acme-execution.svc.cluster.local:9092"
        );
        assert_eq!(ctx.database_secret_name(), "acme-db-credentials");
    }

    #[tokio::test]
    async fn test_cluster_adapter_unavailable_before_attach() {
        let ctx = context();
        assert!(ctx.cluster().await.is_err());
    }
}
