//! Command implementations behind the CLI surface

pub mod deploy;
pub mod destroy;
pub mod logs;
pub mod status;
pub mod upgrade;

use std::sync::Arc;

use crate::adapters::database::HelmDatabase;
use crate::adapters::helm::{HelmCluster, HelmRunner};
use crate::adapters::terraform::TerraformInfra;
use crate::adapters::{ClusterOps, Component};
use crate::config::DeployConfig;
use crate::context::DeployContext;
use crate::errors::DeployError;
use crate::storage::layout::StorageLayout;
use crate::storage::state::DeployState;
use crate::values::addresses::{EXECUTION_SUFFIX, OBSERVABILITY_SUFFIX, PLATFORM_SUFFIX};

/// Build a deployment context wired to the real process-backed adapters.
///
/// `config_path` overrides the default config location under the layout.
pub async fn build_context(
    layout: StorageLayout,
    config_path: Option<&str>,
) -> Result<DeployContext, DeployError> {
    layout.setup().await?;

    let config_file = match config_path {
        Some(path) => crate::filesys::file::File::new(path),
        None => layout.config_file(),
    };
    let config = DeployConfig::load(&config_file).await?;

    let infra = Arc::new(TerraformInfra::new(layout.infra_dir().path()));
    let kubeconfig = infra.kubeconfig().to_path_buf();

    let database_namespace = crate::values::addresses::namespace(&config.project.name, PLATFORM_SUFFIX);
    let database_name = config.project.name.replace('-', "_");

    let cluster_kubeconfig = kubeconfig.clone();
    let cluster_factory: crate::context::ClusterOpsFactory = Box::new(move |_info| {
        Arc::new(HelmCluster::new(HelmRunner::new(cluster_kubeconfig.clone())))
    });

    let database_factory: crate::context::DatabaseOpsFactory = Box::new(move |_cluster| {
        Arc::new(HelmDatabase::new(
            HelmRunner::new(kubeconfig.clone()),
            database_namespace.clone(),
            database_name.clone(),
        ))
    });

    let ctx = DeployContext::new(config, layout, infra, cluster_factory, database_factory);
    let state = DeployState::load_or_default(&ctx.layout.state_file()).await?;
    ctx.restore_state(state).await;
    Ok(ctx)
}

/// Attach the cluster adapter for an already-provisioned cluster
pub async fn attach_existing_cluster(
    ctx: &DeployContext,
) -> Result<Arc<dyn ClusterOps>, DeployError> {
    let info = ctx
        .infra()
        .describe_cluster()
        .await?
        .ok_or_else(|| DeployError::NotFound("no provisioned cluster found".to_string()))?;
    Ok(ctx.attach_cluster(&info).await)
}

/// Namespace each subsystem is installed into
pub fn component_namespace(project: &str, component: Component) -> String {
    let suffix = match component {
        Component::EventBus => EXECUTION_SUFFIX,
        Component::Metrics | Component::LogShipper => OBSERVABILITY_SUFFIX,
        Component::Ingress | Component::Autoscaler | Component::Application => PLATFORM_SUFFIX,
    };
    crate::values::addresses::namespace(project, suffix)
}
