//! `skipper deploy` - run the full deployment pipeline

use colored::Colorize;
use tracing::{info, warn};

use crate::cancel::CancelSignal;
use crate::commands::build_context;
use crate::errors::DeployError;
use crate::pipeline::steps::default_pipeline;
use crate::pipeline::Pipeline;
use crate::storage::layout::StorageLayout;

/// Run the deployment pipeline end to end
pub async fn deploy(
    layout: StorageLayout,
    config_path: Option<&str>,
    version: &str,
    interactive: bool,
    cancel: CancelSignal,
) -> Result<(), DeployError> {
    let ctx = build_context(layout, config_path).await?;
    info!(
        "Deploying '{}' ({}) at version {}",
        ctx.project(),
        ctx.config.project.domain,
        version
    );

    let pipeline = Pipeline::new(default_pipeline(version, interactive));
    pipeline.run(&ctx, &cancel).await?;

    // Final persist; individual steps already save incrementally, so a
    // failure here downgrades to a warning like theirs do
    if let Err(e) = ctx.save().await {
        warn!("Failed to persist final state: {}", e);
        ctx.progress
            .warn(&format!("state could not be saved: {}", e));
    }

    let state = ctx.state.read().await;
    println!();
    println!("{}", "Deployment complete".bold().green());
    println!("  Application:  https://{}", ctx.config.project.domain);
    if let Some(endpoint) = &state.load_balancer_endpoint {
        println!("  Load balancer: {}", endpoint);
    }
    if let Some(monitoring) = &state.monitoring {
        if let Some(url) = &monitoring.dashboard_url {
            println!("  Dashboards:   {}", url);
        }
    }
    for warning in ctx.secrets.warnings().await {
        println!("  {} {}", "warning:".yellow(), warning);
    }
    Ok(())
}
