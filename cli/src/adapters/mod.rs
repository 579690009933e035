//! Operation adapter contracts
//!
//! Narrow interfaces the orchestrator drives. Each call is a single atomic
//! unit with a success/error outcome; adapters may retry internally. The
//! traits exist so steps stay testable against fakes, mirroring how real
//! operations are delegated to external tooling.

pub mod database;
pub mod helm;
pub mod terraform;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelSignal;
use crate::errors::DeployError;

/// Desired cluster shape handed to the infrastructure adapter
#[derive(Debug, Clone)]
pub struct ClusterSpec {
    pub name: String,
    pub provider: String,
    pub region: String,
    pub tier: String,
    pub node_count: u32,
    pub node_size: String,
}

/// A provisioned cluster as reported by the infrastructure adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub name: String,
    pub endpoint: String,
    pub node_count: u32,
}

/// Subsystems installable into the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Ingress,
    Autoscaler,
    EventBus,
    Metrics,
    LogShipper,
    Application,
}

impl Component {
    /// Stable release identifier used by the installer and log commands
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Ingress => "ingress",
            Component::Autoscaler => "autoscaler",
            Component::EventBus => "event-bus",
            Component::Metrics => "metrics",
            Component::LogShipper => "log-shipper",
            Component::Application => "application",
        }
    }
}

impl std::str::FromStr for Component {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ingress" => Ok(Component::Ingress),
            "autoscaler" => Ok(Component::Autoscaler),
            "event-bus" => Ok(Component::EventBus),
            "metrics" => Ok(Component::Metrics),
            "log-shipper" => Ok(Component::LogShipper),
            "application" => Ok(Component::Application),
            _ => Err(format!("Unknown component: {}", s)),
        }
    }
}

/// Database credentials as reported by the database adapter
#[derive(Debug, Clone)]
pub struct DbCredentials {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl DbCredentials {
    /// Connection URL with the password elided, safe for persisted state
    pub fn redacted_url(&self) -> String {
        format!(
            "postgres://{}@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }
}

/// Cloud infrastructure operations
#[async_trait]
pub trait InfraOps: Send + Sync {
    /// Provision the cluster; returns immediately-known cluster facts
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<ClusterInfo, DeployError>;

    /// Tear the cluster down
    async fn destroy_cluster(&self) -> Result<(), DeployError>;

    /// Block until control plane and node group report ready
    async fn wait_ready(&self, cancel: &CancelSignal) -> Result<(), DeployError>;

    /// Probe for an existing cluster; `None` when nothing is provisioned
    async fn describe_cluster(&self) -> Result<Option<ClusterInfo>, DeployError>;
}

/// In-cluster operations against a live endpoint
#[async_trait]
pub trait ClusterOps: Send + Sync {
    /// Install or upgrade a component with the given value tree
    async fn install(
        &self,
        component: Component,
        namespace: &str,
        values: &serde_json::Value,
    ) -> Result<(), DeployError>;

    /// Remove a component
    async fn uninstall(&self, component: Component, namespace: &str) -> Result<(), DeployError>;

    /// Whether the component is already installed
    async fn is_installed(&self, component: Component, namespace: &str)
        -> Result<bool, DeployError>;

    /// Block until the component's workloads report ready
    async fn wait_ready(
        &self,
        component: Component,
        namespace: &str,
        cancel: &CancelSignal,
    ) -> Result<(), DeployError>;

    /// Public endpoint of the ingress load balancer
    async fn load_balancer_endpoint(&self) -> Result<String, DeployError>;

    /// Size in bytes of the ACME credential store held by the ingress
    async fn acme_store_size(&self) -> Result<u64, DeployError>;

    /// Create or replace a Kubernetes-style secret
    async fn apply_secret(
        &self,
        namespace: &str,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<(), DeployError>;

    /// Stream component logs to stdout
    async fn component_logs(
        &self,
        component: Component,
        namespace: &str,
        follow: bool,
        tail: u32,
    ) -> Result<(), DeployError>;
}

/// Database operations
#[async_trait]
pub trait DatabaseOps: Send + Sync {
    /// Deploy the self-hosted database with the given value tree
    async fn deploy(&self, values: &serde_json::Value) -> Result<(), DeployError>;

    /// Run schema migrations
    async fn migrate(&self) -> Result<(), DeployError>;

    /// Fetch (or mint) connection credentials
    async fn credentials(&self) -> Result<DbCredentials, DeployError>;

    /// Whether a database deployment already exists
    async fn is_deployed(&self) -> Result<bool, DeployError>;
}
