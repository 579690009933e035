//! Infrastructure adapter shelling out to a Terraform-style CLI
//!
//! The resource graph itself lives in the infrastructure modules; this
//! adapter only builds argument lists, runs the tool, and reads outputs
//! back. Argument building is kept in pure functions so it stays
//! unit-testable without the binary installed.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::adapters::{ClusterInfo, ClusterSpec, InfraOps};
use crate::cancel::CancelSignal;
use crate::errors::DeployError;
use crate::readiness::{poll, PollSpec};

/// Bounded wait for control plane + node group readiness
const CLUSTER_READY: PollSpec = PollSpec {
    max_attempts: 60,
    interval_secs: 10,
    first_interval_secs: 10,
};

/// Build `-var` flags from a cluster spec.
///
/// Key names are the compatibility surface with the infrastructure
/// modules; do not rename them casually.
pub fn build_var_args(spec: &ClusterSpec) -> Vec<String> {
    vec![
        format!("-var=cluster_name={}", spec.name),
        format!("-var=provider={}", spec.provider),
        format!("-var=region={}", spec.region),
        format!("-var=tier={}", spec.tier),
        format!("-var=node_count={}", spec.node_count),
        format!("-var=node_size={}", spec.node_size),
    ]
}

/// Build arguments for `terraform apply`
pub fn build_apply_args(spec: &ClusterSpec) -> Vec<String> {
    let mut args = vec![
        "apply".to_string(),
        "-auto-approve".to_string(),
        "-input=false".to_string(),
    ];
    args.extend(build_var_args(spec));
    args
}

/// Build arguments for `terraform destroy`
pub fn build_destroy_args() -> Vec<String> {
    vec![
        "destroy".to_string(),
        "-auto-approve".to_string(),
        "-input=false".to_string(),
    ]
}

/// Build arguments for reading a single output value
pub fn build_output_args(name: &str) -> Vec<String> {
    vec!["output".to_string(), "-raw".to_string(), name.to_string()]
}

/// Terraform-backed infrastructure adapter
pub struct TerraformInfra {
    work_dir: PathBuf,
    kubeconfig: PathBuf,
}

impl TerraformInfra {
    /// Create an adapter rooted at the given module directory
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        let kubeconfig = work_dir.join("kubeconfig");
        Self {
            work_dir,
            kubeconfig,
        }
    }

    /// Path of the kubeconfig written by the infrastructure modules
    pub fn kubeconfig(&self) -> &Path {
        &self.kubeconfig
    }

    async fn terraform(&self, args: &[String]) -> Result<String, DeployError> {
        debug!("Running: terraform {}", args.join(" "));
        let output = Command::new("terraform")
            .args(args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| DeployError::InfraError(format!("failed to run terraform: {}", e)))?;

        if !output.status.success() {
            return Err(DeployError::InfraError(format!(
                "terraform {} failed: {}",
                args.first().map(String::as_str).unwrap_or(""),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn read_output(&self, name: &str) -> Result<String, DeployError> {
        self.terraform(&build_output_args(name)).await
    }

    async fn nodes_ready(&self) -> bool {
        let output = Command::new("kubectl")
            .args(["get", "nodes", "--no-headers"])
            .env("KUBECONFIG", &self.kubeconfig)
            .stdin(Stdio::null())
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                let stdout = String::from_utf8_lossy(&out.stdout);
                let mut lines = stdout.lines().filter(|l| !l.trim().is_empty()).peekable();
                lines.peek().is_some()
                    && stdout
                        .lines()
                        .filter(|l| !l.trim().is_empty())
                        .all(|l| l.split_whitespace().nth(1) == Some("Ready"))
            }
            _ => false,
        }
    }
}

#[async_trait]
impl InfraOps for TerraformInfra {
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<ClusterInfo, DeployError> {
        info!("Provisioning cluster '{}' on {}", spec.name, spec.provider);
        self.terraform(&["init".to_string(), "-input=false".to_string()])
            .await?;
        self.terraform(&build_apply_args(spec)).await?;

        let endpoint = self.read_output("cluster_endpoint").await?;
        Ok(ClusterInfo {
            name: spec.name.clone(),
            endpoint,
            node_count: spec.node_count,
        })
    }

    async fn destroy_cluster(&self) -> Result<(), DeployError> {
        info!("Destroying cluster infrastructure");
        self.terraform(&build_destroy_args()).await?;
        Ok(())
    }

    async fn wait_ready(&self, cancel: &CancelSignal) -> Result<(), DeployError> {
        poll(&CLUSTER_READY, cancel, "cluster readiness", |_attempt| async move {
            Ok(if self.nodes_ready().await {
                Some(())
            } else {
                None
            })
        })
        .await
    }

    async fn describe_cluster(&self) -> Result<Option<ClusterInfo>, DeployError> {
        // No state file means terraform has never applied here
        if !self.work_dir.join("terraform.tfstate").exists() {
            return Ok(None);
        }

        let name = match self.read_output("cluster_name").await {
            Ok(name) if !name.is_empty() => name,
            _ => return Ok(None),
        };
        let endpoint = self.read_output("cluster_endpoint").await?;
        let node_count = self
            .read_output("node_count")
            .await?
            .parse::<u32>()
            .unwrap_or(0);

        Ok(Some(ClusterInfo {
            name,
            endpoint,
            node_count,
        }))
    }
}
