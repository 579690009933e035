//! In-memory secrets store
//!
//! Holds generated passwords, API keys and tokens for the lifetime of one
//! process. Values never reach the persisted state document; state sections
//! record secret *names*, and consumers resolve them here.

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::warn;

/// Process-lifetime secret store with reference resolution
#[derive(Default)]
pub struct Secrets {
    values: RwLock<HashMap<String, SecretString>>,
    warnings: RwLock<Vec<String>>,
}

impl Secrets {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a named secret
    pub async fn set(&self, name: &str, value: impl Into<String>) {
        let mut values = self.values.write().await;
        values.insert(name.to_string(), SecretString::from(value.into()));
    }

    /// Fetch a named secret, exposed for handing to an adapter
    pub async fn get(&self, name: &str) -> Option<String> {
        let values = self.values.read().await;
        values.get(name).map(|s| s.expose_secret().to_string())
    }

    /// Fetch a named secret, generating and storing a new one if absent
    pub async fn get_or_generate(&self, name: &str) -> String {
        if let Some(existing) = self.get(name).await {
            return existing;
        }
        let generated = generate_password();
        self.set(name, generated.clone()).await;
        generated
    }

    /// Resolve a secret reference.
    ///
    /// Three forms are supported:
    /// - `env:NAME` reads the environment variable `NAME`
    /// - `file:/path` reads the file and trims surrounding whitespace
    /// - anything else first looks up a stored secret by that name, then
    ///   falls back to treating the reference as a literal value
    ///
    /// Unresolvable references resolve to the empty string and record a
    /// warning instead of failing, so a missing optional credential never
    /// aborts the pipeline on its own.
    pub async fn resolve(&self, reference: &str) -> String {
        if let Some(var) = reference.strip_prefix("env:") {
            return match std::env::var(var) {
                Ok(value) => value,
                Err(_) => {
                    self.record_warning(format!("environment variable '{}' is not set", var))
                        .await;
                    String::new()
                }
            };
        }

        if let Some(path) = reference.strip_prefix("file:") {
            return match tokio::fs::read_to_string(path).await {
                Ok(contents) => contents.trim().to_string(),
                Err(e) => {
                    self.record_warning(format!("unable to read secret file '{}': {}", path, e))
                        .await;
                    String::new()
                }
            };
        }

        if let Some(stored) = self.get(reference).await {
            return stored;
        }

        reference.to_string()
    }

    /// Warnings recorded during resolution, for the end-of-run summary
    pub async fn warnings(&self) -> Vec<String> {
        self.warnings.read().await.clone()
    }

    async fn record_warning(&self, message: String) {
        warn!("Secret resolution: {}", message);
        let mut warnings = self.warnings.write().await;
        warnings.push(message);
    }
}

/// Generate a random password
pub fn generate_password() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_env_reference() {
        std::env::set_var("SKIPPER_TEST_FOO", "bar");
        let secrets = Secrets::new();
        assert_eq!(secrets.resolve("env:SKIPPER_TEST_FOO").await, "bar");
    }

    #[tokio::test]
    async fn test_resolve_file_reference_trims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x");
        tokio::fs::write(&path, "secret\n").await.unwrap();

        let secrets = Secrets::new();
        let reference = format!("file:{}", path.display());
        assert_eq!(secrets.resolve(&reference).await, "secret");
    }

    #[tokio::test]
    async fn test_resolve_literal_passthrough() {
        let secrets = Secrets::new();
        assert_eq!(secrets.resolve("baz").await, "baz");
    }

    #[tokio::test]
    async fn test_resolve_missing_env_warns_and_is_empty() {
        let secrets = Secrets::new();
        assert_eq!(secrets.resolve("env:SKIPPER_TEST_UNSET_VAR").await, "");
        assert_eq!(secrets.warnings().await.len(), 1);
    }

    #[tokio::test]
    async fn test_stored_secret_wins_over_literal() {
        let secrets = Secrets::new();
        secrets.set("db-password", "hunter2").await;
        assert_eq!(secrets.resolve("db-password").await, "hunter2");
    }

    #[tokio::test]
    async fn test_get_or_generate_is_stable() {
        let secrets = Secrets::new();
        let first = secrets.get_or_generate("grafana-admin").await;
        let second = secrets.get_or_generate("grafana-admin").await;
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }
}
