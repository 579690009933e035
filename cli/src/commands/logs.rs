//! `skipper logs` - stream workload logs from the cluster

use std::str::FromStr;

use crate::adapters::Component;
use crate::commands::{attach_existing_cluster, build_context, component_namespace};
use crate::errors::DeployError;
use crate::storage::layout::StorageLayout;

const DEFAULT_TAIL: u32 = 100;

/// Stream logs for one component (application when unspecified)
pub async fn logs(
    layout: StorageLayout,
    config_path: Option<&str>,
    component: Option<&str>,
    follow: bool,
    tail: Option<u32>,
) -> Result<(), DeployError> {
    let component = match component {
        Some(name) => Component::from_str(name).map_err(DeployError::ConfigError)?,
        None => Component::Application,
    };

    let ctx = build_context(layout, config_path).await?;
    let cluster = attach_existing_cluster(&ctx).await?;
    let namespace = component_namespace(ctx.project(), component);

    cluster
        .component_logs(component, &namespace, follow, tail.unwrap_or(DEFAULT_TAIL))
        .await
}
