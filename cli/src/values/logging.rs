//! Log-shipper value tree and sink labelling

use serde_json::{json, Value};

use crate::config::LoggingConfig;

/// Human-readable labels for known sink types.
///
/// Unknown sink identifiers pass through unchanged rather than erroring, so
/// a newer sink type keeps working with an older orchestrator.
pub fn sink_label(sink: &str) -> String {
    match sink {
        "loki" => "Grafana Loki".to_string(),
        "elasticsearch" => "Elasticsearch".to_string(),
        "datadog" => "Datadog".to_string(),
        "cloudwatch" => "Amazon CloudWatch".to_string(),
        "stackdriver" => "Google Cloud Logging".to_string(),
        other => other.to_string(),
    }
}

/// Build the log-shipper value tree
pub async fn log_shipper_values(
    logging: &LoggingConfig,
    secrets: &crate::secrets::Secrets,
) -> Value {
    let credentials = match &logging.credentials_ref {
        Some(reference) => secrets.resolve(reference).await,
        None => String::new(),
    };

    json!({
        "sink": {
            "type": logging.sink,
            "label": sink_label(&logging.sink),
            "endpoint": logging.endpoint,
            "credentials": credentials,
        },
    })
}
