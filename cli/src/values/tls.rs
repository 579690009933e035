//! TLS value tree and SAN assembly

use serde_json::{json, Value};

use crate::config::DeployConfig;

/// Assemble the certificate SAN list.
///
/// Conditional entries:
/// - the monitoring dashboard domain, only when monitoring is enabled and
///   running in local mode (remote mode has no dashboard to expose);
/// - the database dashboard domain, only for a self-hosted database;
/// - user-declared extra domains, appended last.
pub fn san_list(config: &DeployConfig) -> Vec<String> {
    let domain = &config.project.domain;
    let mut sans = vec![domain.clone()];

    if config.monitoring.enabled() && config.monitoring.is_local() {
        sans.push(format!("metrics.{}", domain));
    }

    if config.database.is_self_hosted() {
        sans.push(format!("db.{}", domain));
    }

    for extra in &config.security.extra_domains {
        sans.push(extra.clone());
    }

    sans
}

/// Build the TLS configuration value tree
pub fn tls_values(config: &DeployConfig) -> Value {
    json!({
        "acme": {
            "email": config.security.acme_email,
        },
        "sans": san_list(config),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseMode, MonitoringMode, ProjectConfig};

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
    fn test_default_config_includes_dashboards() {
        // Defaults: monitoring local, database self-hosted
        let sans = san_list(&config());
        assert_eq!(
            sans,
            vec![
                "acme.example.com",
                "metrics.acme.example.com",
                "db.acme.example.com"
            ]
        );
    }

    #[test]
    fn test_remote_monitoring_drops_dashboard_domain() {
        let mut config = config();
        config.monitoring.mode = MonitoringMode::Remote;
        let sans = san_list(&config);
        assert!(!sans.iter().any(|s| s.starts_with("metrics.")));
    }

    #[test]
    fn test_external_database_drops_db_domain() {
        let mut config = config();
        config.database.mode = DatabaseMode::External;
        let sans = san_list(&config);
        assert!(!sans.iter().any(|s| s.starts_with("db.")));
    }

    #[test]
    fn test_extra_domains_appended_last() {
        let mut config = config();
        config.security.extra_domains = vec!["api.partner.example.net".to_string()];
        let sans = san_list(&config);
        assert_eq!(sans.last().unwrap(), "api.partner.example.net");
    }
}
