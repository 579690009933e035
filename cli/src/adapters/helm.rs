//! Cluster operations adapter shelling out to Helm-style tooling
//!
//! Chart contents are external; this adapter builds the install/uninstall
//! invocations, passes generated value trees through a temporary values
//! file, and probes workload readiness. Argument building stays in pure
//! functions for unit testing.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::adapters::{ClusterOps, Component};
use crate::cancel::CancelSignal;
use crate::errors::DeployError;
use crate::readiness::{poll, PollSpec};

/// Chart registry the installer pulls from
const CHART_REPO: &str = "oci://charts.skipper.sh";

/// Workload readiness budget per component
const COMPONENT_READY: PollSpec = PollSpec {
    max_attempts: 30,
    interval_secs: 10,
    first_interval_secs: 10,
};

/// Chart reference for a component
pub fn chart_ref(component: Component) -> String {
    format!("{}/{}", CHART_REPO, component.as_str())
}

/// Build arguments for `helm upgrade --install`
pub fn build_install_args(component: Component, namespace: &str, values_file: &str) -> Vec<String> {
    vec![
        "upgrade".to_string(),
        "--install".to_string(),
        component.as_str().to_string(),
        chart_ref(component),
        "--namespace".to_string(),
        namespace.to_string(),
        "--create-namespace".to_string(),
        "--values".to_string(),
        values_file.to_string(),
    ]
}

/// Build arguments for `helm uninstall`
pub fn build_uninstall_args(component: Component, namespace: &str) -> Vec<String> {
    vec![
        "uninstall".to_string(),
        component.as_str().to_string(),
        "--namespace".to_string(),
        namespace.to_string(),
    ]
}

/// Shared process runner bound to one kubeconfig
#[derive(Debug, Clone)]
pub struct HelmRunner {
    kubeconfig: PathBuf,
}

impl HelmRunner {
    pub fn new(kubeconfig: impl Into<PathBuf>) -> Self {
        Self {
            kubeconfig: kubeconfig.into(),
        }
    }

    pub async fn helm(&self, args: &[String]) -> Result<String, DeployError> {
        self.run("helm", args).await
    }

    pub async fn kubectl(&self, args: &[String]) -> Result<String, DeployError> {
        self.run("kubectl", args).await
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<String, DeployError> {
        debug!("Running: {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .env("KUBECONFIG", &self.kubeconfig)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| DeployError::ClusterError(format!("failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            return Err(DeployError::ClusterError(format!(
                "{} {} failed: {}",
                program,
                args.first().map(String::as_str).unwrap_or(""),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Exit status of a probe command, without treating failure as an error
    async fn probe(&self, program: &str, args: &[String]) -> bool {
        Command::new(program)
            .args(args)
            .env("KUBECONFIG", &self.kubeconfig)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

/// Helm-backed cluster operations
pub struct HelmCluster {
    runner: HelmRunner,
}

impl HelmCluster {
    pub fn new(runner: HelmRunner) -> Self {
        Self { runner }
    }

    async fn write_values_file(values: &serde_json::Value) -> Result<PathBuf, DeployError> {
        let path = std::env::temp_dir().join(format!("skipper-values-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, serde_json::to_vec_pretty(values)?).await?;
        Ok(path)
    }
}

#[async_trait]
impl ClusterOps for HelmCluster {
    async fn install(
        &self,
        component: Component,
        namespace: &str,
        values: &serde_json::Value,
    ) -> Result<(), DeployError> {
        info!("Installing {} into {}", component.as_str(), namespace);
        let values_file = Self::write_values_file(values).await?;
        let args = build_install_args(component, namespace, &values_file.display().to_string());
        let result = self.runner.helm(&args).await;
        let _ = tokio::fs::remove_file(&values_file).await;
        result.map(|_| ())
    }

    async fn uninstall(&self, component: Component, namespace: &str) -> Result<(), DeployError> {
        info!("Uninstalling {} from {}", component.as_str(), namespace);
        self.runner
            .helm(&build_uninstall_args(component, namespace))
            .await
            .map(|_| ())
    }

    async fn is_installed(
        &self,
        component: Component,
        namespace: &str,
    ) -> Result<bool, DeployError> {
        Ok(self
            .runner
            .probe(
                "helm",
                &[
                    "status".to_string(),
                    component.as_str().to_string(),
                    "--namespace".to_string(),
                    namespace.to_string(),
                ],
            )
            .await)
    }

    async fn wait_ready(
        &self,
        component: Component,
        namespace: &str,
        cancel: &CancelSignal,
    ) -> Result<(), DeployError> {
        let what = format!("{} readiness", component.as_str());
        poll(&COMPONENT_READY, cancel, &what, |_attempt| async move {
            let ready = self
                .runner
                .probe(
                    "kubectl",
                    &[
                        "wait".to_string(),
                        "--for=condition=available".to_string(),
                        "deployment".to_string(),
                        "--selector".to_string(),
                        format!("app.kubernetes.io/instance={}", component.as_str()),
                        "--namespace".to_string(),
                        namespace.to_string(),
                        "--timeout=5s".to_string(),
                    ],
                )
                .await;
            Ok(if ready { Some(()) } else { None })
        })
        .await
    }

    async fn load_balancer_endpoint(&self) -> Result<String, DeployError> {
        let endpoint = self
            .runner
            .kubectl(&[
                "get".to_string(),
                "service".to_string(),
                "--all-namespaces".to_string(),
                "--selector".to_string(),
                "app.kubernetes.io/instance=ingress".to_string(),
                "--output".to_string(),
                "jsonpath={.items[0].status.loadBalancer.ingress[0].ip}{.items[0].status.loadBalancer.ingress[0].hostname}"
                    .to_string(),
            ])
            .await?;

        if endpoint.is_empty() {
            return Err(DeployError::ClusterError(
                "load balancer has no public endpoint yet".to_string(),
            ));
        }
        Ok(endpoint)
    }

    async fn acme_store_size(&self) -> Result<u64, DeployError> {
        let output = self
            .runner
            .kubectl(&[
                "exec".to_string(),
                "deploy/ingress".to_string(),
                "--".to_string(),
                "stat".to_string(),
                "-c".to_string(),
                "%s".to_string(),
                "/data/acme.json".to_string(),
            ])
            .await?;
        output
            .trim()
            .parse::<u64>()
            .map_err(|e| DeployError::ClusterError(format!("unparsable ACME store size: {}", e)))
    }

    async fn apply_secret(
        &self,
        namespace: &str,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<(), DeployError> {
        let mut args = vec![
            "create".to_string(),
            "secret".to_string(),
            "generic".to_string(),
            name.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
        ];
        for (key, value) in data {
            args.push(format!("--from-literal={}={}", key, value));
        }
        // Replace-on-apply keeps the call idempotent
        args.push("--dry-run=client".to_string());
        args.push("--output=json".to_string());
        let manifest = self.runner.kubectl(&args).await?;

        let path = std::env::temp_dir().join(format!("skipper-secret-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, manifest).await?;
        let result = self
            .runner
            .kubectl(&[
                "apply".to_string(),
                "--filename".to_string(),
                path.display().to_string(),
            ])
            .await;
        let _ = tokio::fs::remove_file(&path).await;
        result.map(|_| ())
    }

    async fn component_logs(
        &self,
        component: Component,
        namespace: &str,
        follow: bool,
        tail: u32,
    ) -> Result<(), DeployError> {
        let mut args = vec![
            "logs".to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--selector".to_string(),
            format!("app.kubernetes.io/instance={}", component.as_str()),
            format!("--tail={}", tail),
        ];
        if follow {
            args.push("--follow".to_string());
        }

        let status = Command::new("kubectl")
            .args(&args)
            .env("KUBECONFIG", &self.runner.kubeconfig)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| DeployError::ClusterError(format!("failed to run kubectl: {}", e)))?;

        if !status.success() {
            return Err(DeployError::ClusterError(
                "kubectl logs exited with failure".to_string(),
            ));
        }
        Ok(())
    }
}
