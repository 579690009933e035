//! Monitoring value trees and remote-write body assembly

use base64::Engine;
use serde_json::{json, Value};

use crate::config::{DeployConfig, RemoteWriteConfig, RemoteWriteProvider};
use crate::secrets::Secrets;
use crate::values::addresses;

/// New Relic metric API endpoints by region
const NEWRELIC_US: &str = "https://metric-api.newrelic.com/prometheus/v1/write";
const NEWRELIC_EU: &str = "https://metric-api.eu.newrelic.com/prometheus/v1/write";

/// Build the metrics-stack value tree for local mode
pub fn local_monitoring_values(config: &DeployConfig, dashboard_password_secret: &str) -> Value {
    json!({
        "dashboard": {
            "host": format!("metrics.{}", config.project.domain),
            "adminUser": "admin",
            "existingSecret": dashboard_password_secret,
        },
        "retention": "15d",
    })
}

/// Build the remote-write body for the configured provider.
///
/// All authentication material is resolved through the secrets store; a
/// reference string never ends up in the assembled body.
pub async fn remote_write_body(
    remote: &RemoteWriteConfig,
    region: &str,
    secrets: &Secrets,
) -> Value {
    match remote.provider {
        RemoteWriteProvider::Prometheus => {
            let username = resolve_opt(secrets, remote.username_ref.as_deref()).await;
            let password = resolve_opt(secrets, remote.api_key_ref.as_deref()).await;
            let auth = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", username, password));
            json!({
                "url": remote.url.clone().unwrap_or_default(),
                "headers": {
                    "Authorization": format!("Basic {}", auth),
                },
            })
        }
        RemoteWriteProvider::Managed => {
            let workspace = remote.workspace.clone().unwrap_or_default();
            json!({
                "url": format!(
                    "https://aps-workspaces.{}.amazonaws.com/workspaces/{}/api/v1/remote_write",
                    region, workspace
                ),
                "sigv4": {
                    "region": region,
                },
            })
        }
        RemoteWriteProvider::Newrelic => {
            let endpoint = match remote.region.as_deref() {
                Some("eu") => NEWRELIC_EU,
                _ => NEWRELIC_US,
            };
            let api_key = resolve_opt(secrets, remote.api_key_ref.as_deref()).await;
            json!({
                "url": endpoint,
                "headers": {
                    "Api-Key": api_key,
                },
            })
        }
    }
}

async fn resolve_opt(secrets: &Secrets, reference: Option<&str>) -> String {
    match reference {
        Some(r) => secrets.resolve(r).await,
        None => String::new(),
    }
}

/// Namespace the monitoring stack is installed into
pub fn monitoring_namespace(project: &str) -> String {
    addresses::namespace(project, addresses::OBSERVABILITY_SUFFIX)
}
