//! Persisted deployment state
//!
//! The durable record of what has been successfully provisioned. A section
//! is only ever written after its step has completed, so the document never
//! holds a half-applied step. Saves are full-document overwrites through an
//! atomic temp-file rename; `deploy`, `status`, `upgrade` and `destroy` all
//! read this document instead of re-deriving values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::filesys::file::File;

/// Top-level deployment state document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployState {
    /// Provisioned infrastructure; populated by the infrastructure step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infrastructure: Option<InfrastructureState>,

    /// Database deployment; populated by the database step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseState>,

    /// Application workload; populated by the application step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<ApplicationState>,

    /// Monitoring stack; absent when monitoring is disabled or its
    /// optional step failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<MonitoringState>,

    /// Ingress load-balancer endpoint; populated by the core services step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer_endpoint: Option<String>,
}

/// Infrastructure section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureState {
    pub provider: String,
    pub region: String,
    pub cluster_name: String,
    pub endpoint: String,
    pub node_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Database section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseState {
    /// Deployment mode label (`self-hosted`, `external`, `managed`)
    pub mode: String,

    /// Connection URL with credentials elided
    pub connection_url: String,

    /// Name of the in-memory secret holding the password; never the value
    pub credentials_secret: String,
}

/// Application section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationState {
    pub deployed: bool,
    pub version: String,
    pub replicas: u32,
    pub broker_address: String,
    pub endpoint: String,
}

/// Monitoring section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringState {
    pub enabled: bool,
    pub provider: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<String>,

    /// Name of the in-memory secret holding dashboard credentials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_secret: Option<String>,
}

impl DeployState {
    /// Load state from a file, or start empty when no file exists yet
    pub async fn load_or_default(file: &File) -> Result<Self, DeployError> {
        if file.exists().await {
            file.read_json().await
        } else {
            Ok(Self::default())
        }
    }

    /// Persist the full document with an atomic overwrite
    pub async fn save(&self, file: &File) -> Result<(), DeployError> {
        let contents = serde_json::to_vec_pretty(self)?;
        file.write_atomic(&contents).await?;
        file.set_permissions_600().await?;
        Ok(())
    }

    /// Whether the cluster has been provisioned
    pub fn has_infrastructure(&self) -> bool {
        self.infrastructure.is_some()
    }

    /// Scrub every infrastructure-scoped section after a cluster teardown
    pub fn scrub_infrastructure(&mut self) {
        self.infrastructure = None;
        self.database = None;
        self.application = None;
        self.monitoring = None;
        self.load_balancer_endpoint = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let file = File::new(dir.path().join("state.json"));

        let state = DeployState::load_or_default(&file).await.unwrap();
        assert!(!state.has_infrastructure());
        assert!(state.application.is_none());
    }

    #[tokio::test]
    async fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = File::new(dir.path().join("state.json"));

        let mut state = DeployState::default();
        state.infrastructure = Some(InfrastructureState {
            provider: "aws".to_string(),
            region: "us-east-1".to_string(),
            cluster_name: "acme-cluster".to_string(),
            endpoint: "https://example.eks.amazonaws.com".to_string(),
            node_count: 3,
            created_at: Utc::now(),
        });
        state.load_balancer_endpoint = Some("203.0.113.10".to_string());
        state.save(&file).await.unwrap();

        let reloaded = DeployState::load_or_default(&file).await.unwrap();
        assert_eq!(reloaded.infrastructure, state.infrastructure);
        assert_eq!(
            reloaded.load_balancer_endpoint.as_deref(),
            Some("203.0.113.10")
        );
    }

    #[test]
    fn test_scrub_clears_all_sections() {
        let mut state = DeployState {
            load_balancer_endpoint: Some("x".to_string()),
            ..Default::default()
        };
        state.application = Some(ApplicationState {
            deployed: true,
            version: "1.0.0".to_string(),
            replicas: 2,
            broker_address: "kafka:9092".to_string(),
            endpoint: "https://acme.example.com".to_string(),
        });

        state.scrub_infrastructure();
        assert!(state.application.is_none());
        assert!(state.load_balancer_endpoint.is_none());
    }
}
