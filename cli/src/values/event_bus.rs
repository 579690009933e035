//! Event-streaming bus value tree

use serde_json::{json, Value};

use crate::config::DeployConfig;
use crate::values::addresses;

/// Build the event-bus value tree, worker sizing included
pub fn event_bus_values(config: &DeployConfig) -> Value {
    let perf = &config.performance;
    json!({
        "kafka": {
            "partitions": perf.kafka_partitions,
            "replicationFactor": perf.kafka_replication,
            "retentionHours": perf.kafka_retention_hours,
        },
        "workers": {
            "concurrency": perf.kafka_partitions,
        },
    })
}

/// Namespace the event bus is installed into
pub fn event_bus_namespace(project: &str) -> String {
    addresses::namespace(project, addresses::EXECUTION_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_flow_into_tree() {
        let config = DeployConfig::default();
        let tree = event_bus_values(&config);
        assert_eq!(tree["kafka"]["partitions"], 3);
        assert_eq!(tree["kafka"]["replicationFactor"], 3);
        assert_eq!(tree["kafka"]["retentionHours"], 168);
        // Worker concurrency tracks partition count
        assert_eq!(tree["workers"]["concurrency"], 3);
    }

    #[test]
    fn test_namespace_uses_execution_suffix() {
        assert_eq!(event_bus_namespace("acme"), "acme-execution");
    }
}
