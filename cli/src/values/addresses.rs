//! Service address and namespace derivation
//!
//! All in-cluster addresses follow one template:
//! `<service>.<namespace>.svc.cluster.local:<port>`, with namespaces
//! derived from the project name plus a fixed per-subsystem suffix. These
//! are pure, stable functions: re-deploys must address the same resources.

/// Namespace suffix for the event-streaming subsystem
pub const EXECUTION_SUFFIX: &str = "execution";

/// Namespace suffix for core platform services
pub const PLATFORM_SUFFIX: &str = "platform";

/// Namespace suffix for the observability stack
pub const OBSERVABILITY_SUFFIX: &str = "observability";

/// In-cluster Kafka port
pub const KAFKA_PORT: u16 = 9092;

/// Derive a namespace from the project name and a subsystem suffix
pub fn namespace(project: &str, suffix: &str) -> String {
    format!("{}-{}", project, suffix)
}

/// Derive an in-cluster service address
pub fn service_address(service: &str, namespace: &str, port: u16) -> String {
    format!("{}.{}.svc.cluster.local:{}", service, namespace, port)
}

/// Broker address of the event-streaming bus for a project
pub fn broker_address(project: &str) -> String {
    service_address("kafka", &namespace(project, EXECUTION_SUFFIX), KAFKA_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_address_template_is_exact() {
        assert_eq!(
            broker_address("acme"),
            "kafka.acme-execution.svc.cluster.local:9092"
        );
    }

    #[test]
    fn test_namespace_derivation() {
        assert_eq!(namespace("acme", PLATFORM_SUFFIX), "acme-platform");
        assert_eq!(
            namespace("acme", OBSERVABILITY_SUFFIX),
            "acme-observability"
        );
    }
}
