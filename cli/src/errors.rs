//! Error types for the skipper deployment orchestrator

use thiserror::Error;

/// Main error type for the deployment orchestrator
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Infrastructure error: {0}")]
    InfraError(String),

    #[error("Cluster operation error: {0}")]
    ClusterError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Secret error: {0}")]
    SecretError(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: Box<DeployError>,
    },

    #[error("Timed out waiting for {what} after {attempts} attempts")]
    Timeout { what: String, attempts: u32 },

    #[error("Deployment cancelled")]
    Cancelled,

    #[error("Rollback error: {0}")]
    RollbackError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Wrap an error with the name of the step that produced it
    pub fn in_step(self, step: &str) -> Self {
        DeployError::StepFailed {
            step: step.to_string(),
            source: Box::new(self),
        }
    }

    /// Whether the error is a cancellation, directly or wrapped
    pub fn is_cancelled(&self) -> bool {
        match self {
            DeployError::Cancelled => true,
            DeployError::StepFailed { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failed_preserves_source_text() {
        let err = DeployError::InfraError("quota exceeded".to_string()).in_step("infrastructure");
        let text = err.to_string();
        assert!(text.contains("infrastructure"));
        assert!(text.contains("quota exceeded"));
    }

    #[test]
    fn test_cancelled_detected_through_wrapping() {
        let err = DeployError::Cancelled.in_step("event-bus");
        assert!(err.is_cancelled());
        assert!(!DeployError::Timeout {
            what: "dns".to_string(),
            attempts: 120
        }
        .is_cancelled());
    }
}
