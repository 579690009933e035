//! Deployment configuration model
//!
//! The validated, immutable description of the desired end-state for one
//! deployment. Every field the pipeline reads has a deterministic default;
//! optional sections model "feature disabled" as `None` so that steps never
//! have to guard against half-populated sections.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::filesys::file::File;

/// Top-level deployment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Project identity
    pub project: ProjectConfig,

    /// Cloud provider selection
    pub cloud: CloudConfig,

    /// Kubernetes cluster topology
    pub cluster: ClusterConfig,

    /// Database mode and connection settings
    pub database: DatabaseConfig,

    /// Transactional email settings; absent means email is not configured
    pub email: Option<EmailConfig>,

    /// Monitoring stack settings
    pub monitoring: MonitoringConfig,

    /// Log shipping sink; absent means log shipping is disabled
    pub logging: Option<LoggingConfig>,

    /// Performance knobs (replicas, event-bus sizing)
    pub performance: PerformanceConfig,

    /// TLS and certificate settings
    pub security: SecurityConfig,

    /// Arbitrary user-supplied values merged last into generated value trees
    pub custom_values: BTreeMap<String, serde_json::Value>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            cloud: CloudConfig::default(),
            cluster: ClusterConfig::default(),
            database: DatabaseConfig::default(),
            email: None,
            monitoring: MonitoringConfig::default(),
            logging: None,
            performance: PerformanceConfig::default(),
            security: SecurityConfig::default(),
            custom_values: BTreeMap::new(),
        }
    }
}

impl DeployConfig {
    /// Load and validate a configuration file
    pub async fn load(file: &File) -> Result<Self, DeployError> {
        let config: DeployConfig = file.read_json().await?;
        config.validate()?;
        Ok(config)
    }

    /// Validate invariants the pipeline depends on
    pub fn validate(&self) -> Result<(), DeployError> {
        if self.project.name.is_empty() {
            return Err(DeployError::ConfigError(
                "project.name must not be empty".to_string(),
            ));
        }
        if !self
            .project
            .name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(DeployError::ConfigError(format!(
                "project.name '{}' must be lowercase alphanumeric with dashes",
                self.project.name
            )));
        }
        if self.project.domain.is_empty() || !self.project.domain.contains('.') {
            return Err(DeployError::ConfigError(format!(
                "project.domain '{}' is not a valid domain",
                self.project.domain
            )));
        }
        if let Some(email) = &self.email {
            if email.smtp_host.is_empty() {
                return Err(DeployError::ConfigError(
                    "email.smtp_host must not be empty when email is configured".to_string(),
                ));
            }
        }
        if self.monitoring.mode == MonitoringMode::Remote && self.monitoring.remote.is_none() {
            return Err(DeployError::ConfigError(
                "monitoring.remote section is required when monitoring.mode is 'remote'"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Project identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Short project name; used to derive namespaces and resource names
    #[serde(default)]
    pub name: String,

    /// Base domain the deployment is served under
    #[serde(default)]
    pub domain: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            domain: String::new(),
        }
    }
}

/// Cloud provider selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Cloud provider
    #[serde(default)]
    pub provider: CloudProvider,

    /// Provider region
    #[serde(default = "default_region")]
    pub region: String,

    /// Performance tier, passed through to the infrastructure modules
    #[serde(default = "default_tier")]
    pub tier: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_tier() -> String {
    "standard".to_string()
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            provider: CloudProvider::default(),
            region: default_region(),
            tier: default_tier(),
        }
    }
}

/// Supported cloud providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    #[default]
    Aws,
    Gcp,
    Azure,
}

impl CloudProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "aws",
            CloudProvider::Gcp => "gcp",
            CloudProvider::Azure => "azure",
        }
    }
}

/// Kubernetes cluster topology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Worker node count
    #[serde(default = "default_node_count")]
    pub node_count: u32,

    /// Worker node size identifier (provider-specific)
    #[serde(default = "default_node_size")]
    pub node_size: String,
}

fn default_node_count() -> u32 {
    3
}

fn default_node_size() -> String {
    "medium".to_string()
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_count: default_node_count(),
            node_size: default_node_size(),
        }
    }
}

/// Database deployment mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatabaseMode {
    /// Deployed into the cluster by the pipeline
    #[default]
    SelfHosted,
    /// Pre-existing database operated by the user
    External,
    /// Provider-managed database service
    Managed,
}

/// Database settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Deployment mode
    pub mode: DatabaseMode,

    /// Connection URL for external/managed modes; may embed a secret
    /// reference (`env:` or `file:` form) for the password
    pub url: Option<String>,

    /// Secret reference for the database password
    pub password_ref: Option<String>,
}

impl DatabaseConfig {
    /// Whether the pipeline deploys the database itself
    pub fn is_self_hosted(&self) -> bool {
        self.mode == DatabaseMode::SelfHosted
    }
}

/// Transactional email settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Provider label, recorded in state for status display
    pub provider: String,

    /// SMTP relay host
    pub smtp_host: String,

    /// SMTP relay port
    pub smtp_port: u16,

    /// SMTP username
    pub smtp_username: String,

    /// Secret reference for the SMTP password
    pub smtp_password_ref: String,

    /// Sender address
    pub sender: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            provider: "smtp".to_string(),
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password_ref: String::new(),
            sender: String::new(),
        }
    }
}

/// Monitoring mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitoringMode {
    /// In-cluster metrics stack with a local dashboard
    #[default]
    Local,
    /// Metrics shipped to a remote-write endpoint
    Remote,
    /// No monitoring stack installed
    Disabled,
}

/// Monitoring settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Monitoring mode
    pub mode: MonitoringMode,

    /// Remote-write target; required when mode is `remote`
    pub remote: Option<RemoteWriteConfig>,
}

impl MonitoringConfig {
    /// Whether any monitoring stack is installed
    pub fn enabled(&self) -> bool {
        self.mode != MonitoringMode::Disabled
    }

    /// Whether the local dashboard is exposed
    pub fn is_local(&self) -> bool {
        self.mode == MonitoringMode::Local
    }
}

/// Remote-write provider family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteWriteProvider {
    /// Any Prometheus-compatible remote-write endpoint
    #[default]
    Prometheus,
    /// Cloud-managed Prometheus workspace
    Managed,
    /// New Relic metric API with region-specific endpoints
    Newrelic,
}

/// Remote-write target settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteWriteConfig {
    /// Provider family
    pub provider: RemoteWriteProvider,

    /// Endpoint URL for `prometheus` provider
    pub url: Option<String>,

    /// Workspace identifier for `managed` provider
    pub workspace: Option<String>,

    /// Vendor region for `newrelic` provider (`us` or `eu`)
    pub region: Option<String>,

    /// Secret reference for the basic-auth username
    pub username_ref: Option<String>,

    /// Secret reference for the API key or basic-auth password
    pub api_key_ref: Option<String>,
}

/// Log shipping sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Sink type identifier (`loki`, `elasticsearch`, `datadog`, ...)
    pub sink: String,

    /// Sink endpoint
    pub endpoint: String,

    /// Secret reference for sink credentials
    pub credentials_ref: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            sink: "loki".to_string(),
            endpoint: String::new(),
            credentials_ref: None,
        }
    }
}

/// Performance knobs
///
/// A zero value means "unset"; the propagation layer substitutes the
/// documented defaults so that adapters never see a zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Application replica count (0 = default)
    pub app_replicas: u32,

    /// Autoscaler minimum replicas (0 = default)
    pub min_replicas: u32,

    /// Autoscaler maximum replicas (0 = default)
    pub max_replicas: u32,

    /// Event-bus partition count per topic
    pub kafka_partitions: u32,

    /// Event-bus replication factor
    pub kafka_replication: u32,

    /// Event-bus retention in hours
    pub kafka_retention_hours: u32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            app_replicas: 0,
            min_replicas: 0,
            max_replicas: 0,
            kafka_partitions: default_kafka_partitions(),
            kafka_replication: default_kafka_replication(),
            kafka_retention_hours: default_kafka_retention_hours(),
        }
    }
}

fn default_kafka_partitions() -> u32 {
    3
}

fn default_kafka_replication() -> u32 {
    3
}

fn default_kafka_retention_hours() -> u32 {
    168
}

/// TLS and certificate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Contact email for ACME certificate issuance
    pub acme_email: String,

    /// Extra domains appended to the certificate SAN list
    pub extra_domains: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            acme_email: String::new(),
            extra_domains: Vec::new(),
        }
    }
}
