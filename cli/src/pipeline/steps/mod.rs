//! Deployment steps, in their fixed execution order
//!
//! Each later step consumes values an earlier one produced: the cluster
//! endpoint before any install, the broker address before the application,
//! the load-balancer endpoint before DNS and TLS checks.

pub mod application;
pub mod core_services;
pub mod database;
pub mod dns;
pub mod email;
pub mod event_bus;
pub mod infrastructure;
pub mod logging_stack;
pub mod monitoring;
pub mod tls;

use std::sync::Arc;

use crate::pipeline::Step;

/// Assemble the full deployment pipeline in its fixed order.
///
/// `app_version` is the workload version to install; `interactive` allows
/// the DNS step to offer continue-on-timeout.
pub fn default_pipeline(app_version: &str, interactive: bool) -> Vec<Arc<dyn Step>> {
    vec![
        Arc::new(infrastructure::InfrastructureStep),
        Arc::new(core_services::CoreServicesStep),
        Arc::new(database::DatabaseStep),
        Arc::new(email::EmailStep),
        Arc::new(event_bus::EventBusStep),
        Arc::new(monitoring::MonitoringStep),
        Arc::new(logging_stack::LoggingStep),
        Arc::new(application::ApplicationStep::new(app_version)),
        Arc::new(dns::DnsVerificationStep::new(interactive)),
        Arc::new(tls::TlsStep::default()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_order_is_fixed() {
        let steps = default_pipeline("1.0.0", false);
        let names: Vec<&str> = steps.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "infrastructure",
                "core-services",
                "database",
                "email",
                "event-bus",
                "monitoring",
                "logging",
                "application",
                "dns-verification",
                "tls-configuration",
            ]
        );
    }

    #[test]
    fn test_observability_steps_are_optional() {
        let steps = default_pipeline("1.0.0", false);
        for step in &steps {
            let optional = matches!(step.name(), "monitoring" | "logging");
            assert_eq!(!step.required(), optional, "step {}", step.name());
        }
    }
}
