//! Application workload value tree

use serde_json::{json, Value};

use crate::config::DeployConfig;
use crate::values::{addresses, merge_custom};

/// Default replica count when unset
pub const DEFAULT_REPLICAS: u32 = 2;

/// Default autoscaler floor when unset
pub const DEFAULT_MIN_REPLICAS: u32 = 1;

/// Default autoscaler ceiling when unset
pub const DEFAULT_MAX_REPLICAS: u32 = 10;

/// A configured positive value wins; zero falls back to the default
fn positive_or(configured: u32, default: u32) -> u32 {
    if configured > 0 {
        configured
    } else {
        default
    }
}

/// Effective replica count
pub fn replicas(config: &DeployConfig) -> u32 {
    positive_or(config.performance.app_replicas, DEFAULT_REPLICAS)
}

/// Effective autoscaler floor
pub fn min_replicas(config: &DeployConfig) -> u32 {
    positive_or(config.performance.min_replicas, DEFAULT_MIN_REPLICAS)
}

/// Effective autoscaler ceiling
pub fn max_replicas(config: &DeployConfig) -> u32 {
    positive_or(config.performance.max_replicas, DEFAULT_MAX_REPLICAS)
}

/// Build the application workload value tree.
///
/// `broker` and `database_url` come from state produced by earlier steps;
/// `database_secret` names an in-cluster secret, never a raw credential.
pub fn application_values(
    config: &DeployConfig,
    version: &str,
    broker: &str,
    database_url: &str,
    database_secret: &str,
) -> Value {
    let mut tree = json!({
        "image": {
            "tag": version,
        },
        "replicaCount": replicas(config),
        "autoscaling": {
            "minReplicas": min_replicas(config),
            "maxReplicas": max_replicas(config),
        },
        "broker": {
            "address": broker,
        },
        "database": {
            "url": database_url,
            "existingSecret": database_secret,
        },
        "ingress": {
            "host": config.project.domain,
        },
    });

    merge_custom(&mut tree, &config.custom_values);
    tree
}

/// Application namespace for a project
pub fn app_namespace(project: &str) -> String {
    addresses::namespace(project, addresses::PLATFORM_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use serde_json::json;

    fn config() -> DeployConfig {
        DeployConfig {
            project: ProjectConfig {
                name: "acme".to_string(),
                domain: "acme.example.com".to_string(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_replica_config_yields_documented_defaults() {
        let config = config();
        assert_eq!(config.performance.app_replicas, 0);
        assert_eq!(replicas(&config), 2);
        assert_eq!(min_replicas(&config), 1);
        assert_eq!(max_replicas(&config), 10);
    }

    #[test]
    fn test_positive_replica_config_wins() {
        let mut config = config();
        config.performance.app_replicas = 7;
        config.performance.max_replicas = 20;
        assert_eq!(replicas(&config), 7);
        assert_eq!(min_replicas(&config), 1);
        assert_eq!(max_replicas(&config), 20);
    }

    #[test]
    fn test_value_tree_carries_propagated_inputs() {
        let tree = application_values(
            &config(),
            "1.4.0",
            "kafka.acme-execution.svc.cluster.local:9092",
            "postgres://app@db:5432/app",
            "acme-db-credentials",
        );

        assert_eq!(
            tree["broker"]["address"],
            "kafka.acme-execution.svc.cluster.local:9092"
        );
        assert_eq!(tree["database"]["existingSecret"], "acme-db-credentials");
        assert_eq!(tree["ingress"]["host"], "acme.example.com");
        assert_eq!(tree["autoscaling"]["minReplicas"], 1);
    }

    #[test]
    fn test_custom_values_merge_last() {
        let mut config = config();
        config
            .custom_values
            .insert("replicaCount".to_string(), json!(9));

        let tree = application_values(&config, "1.0.0", "b", "u", "s");
        assert_eq!(tree["replicaCount"], 9);
        // Generated keys the pipeline reads back are still present
        assert_eq!(tree["ingress"]["host"], "acme.example.com");
    }
}
