//! `skipper upgrade` - inspect and roll application versions forward

use std::sync::Arc;

use colored::Colorize;
use tracing::{info, warn};

use crate::cancel::CancelSignal;
use crate::commands::build_context;
use crate::errors::DeployError;
use crate::pipeline::steps::application::ApplicationStep;
use crate::pipeline::steps::infrastructure::InfrastructureStep;
use crate::pipeline::{Pipeline, Step};
use crate::storage::layout::StorageLayout;
use crate::storage::state::DeployState;

/// Release channels an installation can track
const CHANNELS: [(&str, &str); 3] = [
    ("stable", "tested releases, recommended for production"),
    ("candidate", "release candidates, one cycle ahead of stable"),
    ("edge", "latest builds, no stability promises"),
];

/// List the available release channels
pub fn list() {
    println!("{}", "Release channels".bold());
    for (name, description) in CHANNELS {
        println!("  {:<10} {}", name.bold(), description);
    }
}

/// Show the currently deployed application version
pub async fn status(layout: StorageLayout) -> Result<(), DeployError> {
    let state = DeployState::load_or_default(&layout.state_file()).await?;
    match &state.application {
        Some(app) if app.deployed => {
            println!("Deployed version: {}", app.version.bold());
        }
        _ => println!("{}", "No application deployed yet".dimmed()),
    }
    Ok(())
}

/// Re-run the application rollout at a new version. The infrastructure
/// step runs first only to re-attach the existing cluster; it never
/// provisions when a cluster is already recorded.
pub async fn run(
    layout: StorageLayout,
    config_path: Option<&str>,
    version: &str,
    cancel: CancelSignal,
) -> Result<(), DeployError> {
    let ctx = build_context(layout, config_path).await?;

    if let Some(app) = &ctx.state.read().await.application {
        if app.deployed && app.version == version {
            println!("Already at version {}", version.bold());
            return Ok(());
        }
    }

    info!("Upgrading '{}' to version {}", ctx.project(), version);
    let steps: Vec<Arc<dyn Step>> = vec![
        Arc::new(InfrastructureStep),
        Arc::new(ApplicationStep::new(version)),
    ];
    Pipeline::new(steps).run(&ctx, &cancel).await?;
    // The pipeline already saves after each step; a failed final save
    // does not fail a completed upgrade
    if let Err(e) = ctx.save().await {
        warn!("Failed to persist final state: {}", e);
        ctx.progress
            .warn(&format!("state could not be saved: {}", e));
    }

    println!("{}", format!("Upgraded to {}", version).bold().green());
    Ok(())
}
