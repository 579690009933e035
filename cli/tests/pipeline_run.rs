//! End-to-end pipeline runs against in-memory adapters
//!
//! Exercises the full step sequence twice against the same fake cloud to
//! prove re-runs reuse what exists instead of re-provisioning it.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use skipper::adapters::{
    ClusterInfo, ClusterOps, ClusterSpec, Component, DatabaseOps, DbCredentials, InfraOps,
};
use skipper::cancel::CancelSignal;
use skipper::config::{DeployConfig, EmailConfig, LoggingConfig, ProjectConfig};
use skipper::context::DeployContext;
use skipper::errors::DeployError;
use skipper::pipeline::steps::{application, core_services, database, dns, email, event_bus,
    infrastructure, logging_stack, monitoring, tls};
use skipper::pipeline::{Pipeline, Step, StepOutcome};
use skipper::readiness::dns::DnsResolver;
use skipper::readiness::https::HttpsProbe;
use skipper::readiness::PollSpec;
use skipper::storage::layout::StorageLayout;
use skipper::storage::state::DeployState;

const LB_ENDPOINT: &str = "203.0.113.10";

const FAST: PollSpec = PollSpec {
    max_attempts: 3,
    interval_secs: 0,
    first_interval_secs: 0,
};

#[derive(Default)]
struct FakeInfra {
    cluster: Mutex<Option<ClusterInfo>>,
    creates: AtomicU32,
    destroys: AtomicU32,
}

#[async_trait]
impl InfraOps for FakeInfra {
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<ClusterInfo, DeployError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let info = ClusterInfo {
            name: spec.name.clone(),
            endpoint: "https://cluster.fake:6443".to_string(),
            node_count: spec.node_count,
        };
        *self.cluster.lock().unwrap() = Some(info.clone());
        Ok(info)
    }

    async fn destroy_cluster(&self) -> Result<(), DeployError> {
        self.destroys.fetch_add(1, Ordering::SeqCst);
        *self.cluster.lock().unwrap() = None;
        Ok(())
    }

    async fn wait_ready(&self, _cancel: &CancelSignal) -> Result<(), DeployError> {
        Ok(())
    }

    async fn describe_cluster(&self) -> Result<Option<ClusterInfo>, DeployError> {
        Ok(self.cluster.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct FakeCluster {
    installed: Mutex<HashSet<String>>,
    installs: Mutex<Vec<String>>,
    uninstalls: Mutex<Vec<String>>,
    secrets: Mutex<Vec<String>>,
}

fn release_key(component: Component, namespace: &str) -> String {
    format!("{}/{}", namespace, component.as_str())
}

#[async_trait]
impl ClusterOps for FakeCluster {
    async fn install(
        &self,
        component: Component,
        namespace: &str,
        _values: &serde_json::Value,
    ) -> Result<(), DeployError> {
        let key = release_key(component, namespace);
        self.installs.lock().unwrap().push(key.clone());
        self.installed.lock().unwrap().insert(key);
        Ok(())
    }

    async fn uninstall(&self, component: Component, namespace: &str) -> Result<(), DeployError> {
        let key = release_key(component, namespace);
        self.uninstalls.lock().unwrap().push(key.clone());
        self.installed.lock().unwrap().remove(&key);
        Ok(())
    }

    async fn is_installed(
        &self,
        component: Component,
        namespace: &str,
    ) -> Result<bool, DeployError> {
        Ok(self
            .installed
            .lock()
            .unwrap()
            .contains(&release_key(component, namespace)))
    }

    async fn wait_ready(
        &self,
        _component: Component,
        _namespace: &str,
        _cancel: &CancelSignal,
    ) -> Result<(), DeployError> {
        Ok(())
    }

    async fn load_balancer_endpoint(&self) -> Result<String, DeployError> {
        Ok(LB_ENDPOINT.to_string())
    }

    async fn acme_store_size(&self) -> Result<u64, DeployError> {
        Ok(4096)
    }

    async fn apply_secret(
        &self,
        namespace: &str,
        name: &str,
        _data: &BTreeMap<String, String>,
    ) -> Result<(), DeployError> {
        self.secrets
            .lock()
            .unwrap()
            .push(format!("{}/{}", namespace, name));
        Ok(())
    }

    async fn component_logs(
        &self,
        _component: Component,
        _namespace: &str,
        _follow: bool,
        _tail: u32,
    ) -> Result<(), DeployError> {
        Ok(())
    }
}

#[derive(Default)]
struct FakeDatabase {
    deployed: Mutex<bool>,
    deploys: AtomicU32,
    migrations: AtomicU32,
}

#[async_trait]
impl DatabaseOps for FakeDatabase {
    async fn deploy(&self, _values: &serde_json::Value) -> Result<(), DeployError> {
        self.deploys.fetch_add(1, Ordering::SeqCst);
        *self.deployed.lock().unwrap() = true;
        Ok(())
    }

    async fn migrate(&self) -> Result<(), DeployError> {
        self.migrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn credentials(&self) -> Result<DbCredentials, DeployError> {
        Ok(DbCredentials {
            username: "app".to_string(),
            password: "s3cret".to_string(),
            host: "database.acme-platform.svc.cluster.local".to_string(),
            port: 5432,
            database: "acme".to_string(),
        })
    }

    async fn is_deployed(&self) -> Result<bool, DeployError> {
        Ok(*self.deployed.lock().unwrap())
    }
}

struct InstantResolver;

#[async_trait]
impl DnsResolver for InstantResolver {
    fn name(&self) -> &str {
        "fake"
    }

    async fn lookup(&self, _domain: &str) -> Result<Vec<String>, DeployError> {
        Ok(vec![LB_ENDPOINT.to_string()])
    }
}

struct AlwaysValid;

#[async_trait]
impl HttpsProbe for AlwaysValid {
    async fn verify(&self, _domain: &str) -> Result<(), DeployError> {
        Ok(())
    }
}

struct Fakes {
    infra: Arc<FakeInfra>,
    cluster: Arc<FakeCluster>,
    database: Arc<FakeDatabase>,
}

impl Fakes {
    fn new() -> Self {
        Self {
            infra: Arc::new(FakeInfra::default()),
            cluster: Arc::new(FakeCluster::default()),
            database: Arc::new(FakeDatabase::default()),
        }
    }
}

fn config() -> DeployConfig {
    DeployConfig {
        project: ProjectConfig {
            name: "acme".to_string(),
            domain: "acme.example.com".to_string(),
        },
        email: Some(EmailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_username: "mailer".to_string(),
            smtp_password_ref: "env:SMTP_UNSET_FOR_TEST".to_string(),
            sender: "noreply@acme.example.com".to_string(),
            ..Default::default()
        }),
        logging: Some(LoggingConfig {
            sink: "loki".to_string(),
            endpoint: "https://loki.example.com".to_string(),
            credentials_ref: None,
        }),
        ..Default::default()
    }
}

fn context(fakes: &Fakes, layout: StorageLayout) -> DeployContext {
    let cluster = fakes.cluster.clone();
    let database = fakes.database.clone();
    DeployContext::new(
        config(),
        layout,
        fakes.infra.clone(),
        Box::new(move |_info| cluster.clone() as Arc<dyn ClusterOps>),
        Box::new(move |_cluster| database.clone() as Arc<dyn DatabaseOps>),
    )
    .with_silent_progress()
}

/// Required step that fails after everything before it succeeded
struct BrokenVerify;

#[async_trait]
impl Step for BrokenVerify {
    fn name(&self) -> &'static str {
        "broken-verify"
    }

    fn description(&self) -> &'static str {
        "Verification that always fails"
    }

    fn estimate(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn execute(
        &self,
        _ctx: &DeployContext,
        _cancel: &CancelSignal,
    ) -> Result<StepOutcome, DeployError> {
        Err(DeployError::Internal("verification failed".to_string()))
    }
}

fn full_steps() -> Vec<Arc<dyn Step>> {
    vec![
        Arc::new(infrastructure::InfrastructureStep),
        Arc::new(core_services::CoreServicesStep),
        Arc::new(database::DatabaseStep),
        Arc::new(email::EmailStep),
        Arc::new(event_bus::EventBusStep),
        Arc::new(monitoring::MonitoringStep),
        Arc::new(logging_stack::LoggingStep),
        Arc::new(application::ApplicationStep::new("1.4.2")),
        Arc::new(dns::DnsVerificationStep::with_resolvers(
            false,
            FAST,
            vec![Arc::new(InstantResolver)],
        )),
        Arc::new(tls::TlsStep::with_probe(
            Arc::new(AlwaysValid),
            FAST,
            FAST,
            FAST,
        )),
    ]
}

async fn run_steps(
    fakes: &Fakes,
    layout: StorageLayout,
    steps: Vec<Arc<dyn Step>>,
) -> Result<DeployState, DeployError> {
    let ctx = context(fakes, layout);
    let state = DeployState::load_or_default(&ctx.layout.state_file())
        .await
        .unwrap();
    ctx.restore_state(state).await;

    Pipeline::new(steps).run(&ctx, &CancelSignal::new()).await?;
    let state = ctx.state.read().await.clone();
    Ok(state)
}

async fn run_once(fakes: &Fakes, layout: StorageLayout) -> DeployState {
    run_steps(fakes, layout, full_steps()).await.unwrap()
}

#[tokio::test]
async fn test_full_run_populates_every_state_section() {
    let dir = tempfile::tempdir().unwrap();
    let fakes = Fakes::new();

    let state = run_once(&fakes, StorageLayout::new(dir.path())).await;

    let infra = state.infrastructure.expect("infrastructure recorded");
    assert_eq!(infra.cluster_name, "acme-cluster");
    assert_eq!(state.load_balancer_endpoint.as_deref(), Some(LB_ENDPOINT));

    let db = state.database.expect("database recorded");
    assert_eq!(db.mode, "self-hosted");
    assert!(
        !db.connection_url.contains("s3cret"),
        "state must never embed the database password"
    );

    let app = state.application.expect("application recorded");
    assert!(app.deployed);
    assert_eq!(app.version, "1.4.2");
    assert_eq!(
        app.broker_address,
        "kafka.acme-execution.svc.cluster.local:9092"
    );

    let monitoring = state.monitoring.expect("monitoring recorded");
    assert!(monitoring.enabled);

    // Persisted copy round-trips to the same document
    let on_disk = DeployState::load_or_default(&StorageLayout::new(dir.path()).state_file())
        .await
        .unwrap();
    assert_eq!(on_disk.load_balancer_endpoint, state.load_balancer_endpoint);
    assert_eq!(on_disk.application, Some(app));
}

#[tokio::test]
async fn test_second_run_reuses_existing_resources() {
    let dir = tempfile::tempdir().unwrap();
    let fakes = Fakes::new();

    let first = run_once(&fakes, StorageLayout::new(dir.path())).await;
    let installs_after_first = fakes.cluster.installs.lock().unwrap().len();
    let second = run_once(&fakes, StorageLayout::new(dir.path())).await;

    assert_eq!(fakes.infra.creates.load(Ordering::SeqCst), 1);
    assert_eq!(fakes.database.deploys.load(Ordering::SeqCst), 1);

    // Monitoring and TLS upgrade their releases in place; everything else
    // skips when already installed
    let installs = fakes.cluster.installs.lock().unwrap();
    let second_run_installs: Vec<_> = installs[installs_after_first..].to_vec();
    assert_eq!(
        second_run_installs,
        vec!["acme-observability/metrics", "acme-platform/ingress"]
    );

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_failed_upgrade_keeps_preexisting_cluster() {
    let dir = tempfile::tempdir().unwrap();
    let fakes = Fakes::new();

    run_once(&fakes, StorageLayout::new(dir.path())).await;

    // The upgrade shape: re-attach the cluster, then a required step fails
    let steps: Vec<Arc<dyn Step>> = vec![
        Arc::new(infrastructure::InfrastructureStep),
        Arc::new(BrokenVerify),
    ];
    run_steps(&fakes, StorageLayout::new(dir.path()), steps)
        .await
        .unwrap_err();

    // Rollback must not destroy a cluster this run only reused
    assert_eq!(fakes.infra.destroys.load(Ordering::SeqCst), 0);
    assert!(fakes.infra.describe_cluster().await.unwrap().is_some());
}

#[tokio::test]
async fn test_rerun_failure_leaves_preexisting_components() {
    let dir = tempfile::tempdir().unwrap();
    let fakes = Fakes::new();

    run_once(&fakes, StorageLayout::new(dir.path())).await;

    // Everything already exists, so every step reuses; the appended
    // failure must find nothing to undo
    let mut steps = full_steps();
    steps.push(Arc::new(BrokenVerify));
    run_steps(&fakes, StorageLayout::new(dir.path()), steps)
        .await
        .unwrap_err();

    assert_eq!(fakes.infra.destroys.load(Ordering::SeqCst), 0);
    assert!(fakes.cluster.uninstalls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_rolled_back_run_persists_scrubbed_state() {
    let dir = tempfile::tempdir().unwrap();
    let fakes = Fakes::new();

    let steps: Vec<Arc<dyn Step>> = vec![
        Arc::new(infrastructure::InfrastructureStep),
        Arc::new(core_services::CoreServicesStep),
        Arc::new(BrokenVerify),
    ];
    run_steps(&fakes, StorageLayout::new(dir.path()), steps)
        .await
        .unwrap_err();

    // This run created everything, so rollback removes it all
    assert_eq!(fakes.infra.destroys.load(Ordering::SeqCst), 1);
    assert_eq!(
        fakes.cluster.uninstalls.lock().unwrap().as_slice(),
        ["acme-platform/autoscaler", "acme-platform/ingress"]
    );

    // The on-disk document must agree with what rollback removed
    let on_disk = DeployState::load_or_default(&StorageLayout::new(dir.path()).state_file())
        .await
        .unwrap();
    assert!(on_disk.infrastructure.is_none());
    assert!(on_disk.load_balancer_endpoint.is_none());
}

#[tokio::test]
async fn test_destroyed_cluster_is_reprovisioned() {
    let dir = tempfile::tempdir().unwrap();
    let fakes = Fakes::new();

    run_once(&fakes, StorageLayout::new(dir.path())).await;
    fakes.infra.destroy_cluster().await.unwrap();
    run_once(&fakes, StorageLayout::new(dir.path())).await;

    assert_eq!(fakes.infra.creates.load(Ordering::SeqCst), 2);
}
