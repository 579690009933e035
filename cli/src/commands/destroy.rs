//! `skipper destroy` - tear down a deployment

use colored::Colorize;
use tracing::{info, warn};

use crate::adapters::Component;
use crate::commands::{attach_existing_cluster, build_context, component_namespace};
use crate::errors::DeployError;
use crate::storage::layout::StorageLayout;

/// Uninstall order: workloads first, shared services last
const TEARDOWN_ORDER: [Component; 6] = [
    Component::Application,
    Component::LogShipper,
    Component::Metrics,
    Component::EventBus,
    Component::Autoscaler,
    Component::Ingress,
];

/// Tear down installed subsystems; with `destroy_cluster` the
/// infrastructure goes too. Database releases are left in place either
/// way so data removal stays a deliberate, manual act.
pub async fn destroy(
    layout: StorageLayout,
    config_path: Option<&str>,
    destroy_cluster: bool,
    force: bool,
) -> Result<(), DeployError> {
    let ctx = build_context(layout, config_path).await?;

    if !force {
        let scope = if destroy_cluster {
            "every subsystem AND the cluster"
        } else {
            "every installed subsystem"
        };
        let prompt = format!("Remove {} of '{}'?", scope, ctx.project());
        let confirmed = tokio::task::spawn_blocking(move || {
            inquire::Confirm::new(&prompt).with_default(false).prompt()
        })
        .await
        .map_err(|e| DeployError::Internal(e.to_string()))?
        .unwrap_or(false);
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    match attach_existing_cluster(&ctx).await {
        Ok(cluster) => {
            for component in TEARDOWN_ORDER {
                let namespace = component_namespace(ctx.project(), component);
                if cluster.is_installed(component, &namespace).await? {
                    info!("Removing {}", component.as_str());
                    cluster.uninstall(component, &namespace).await?;
                    println!("  {} {}", "removed".red(), component.as_str());
                }
            }
        }
        Err(e) if destroy_cluster => {
            // Nothing reachable to uninstall; terraform destroy sweeps it anyway
            warn!("Skipping subsystem teardown: {}", e);
        }
        Err(e) => return Err(e),
    }

    {
        let mut state = ctx.state.write().await;
        state.application = None;
        state.monitoring = None;
        state.load_balancer_endpoint = None;
    }

    if destroy_cluster {
        info!("Destroying cluster infrastructure");
        ctx.infra().destroy_cluster().await?;
        let mut state = ctx.state.write().await;
        state.scrub_infrastructure();
        state.database = None;
        println!("  {} cluster infrastructure", "destroyed".red());
    } else if ctx.state.read().await.database.is_some() {
        println!(
            "  {} database release kept; remove it manually if the data is disposable",
            "note:".yellow()
        );
    }

    ctx.save().await?;
    println!("{}", "Teardown complete".bold());
    Ok(())
}
