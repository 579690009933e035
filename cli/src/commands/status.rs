//! `skipper status` - render the persisted deployment state

use colored::Colorize;

use crate::config::DeployConfig;
use crate::errors::DeployError;
use crate::storage::layout::StorageLayout;
use crate::storage::state::DeployState;

fn flag(on: bool) -> colored::ColoredString {
    if on {
        "yes".green()
    } else {
        "no".dimmed()
    }
}

/// Print a human-readable summary of what is currently deployed
pub async fn status(layout: StorageLayout, config_path: Option<&str>) -> Result<(), DeployError> {
    let config_file = match config_path {
        Some(path) => crate::filesys::file::File::new(path),
        None => layout.config_file(),
    };
    let config = DeployConfig::load(&config_file).await?;
    let state = DeployState::load_or_default(&layout.state_file()).await?;

    println!("{}", format!("Project: {}", config.project.name).bold());
    println!("Domain:  {}", config.project.domain);
    println!();

    match &state.infrastructure {
        Some(infra) => {
            println!("{}", "Infrastructure".bold());
            println!("  Provider:   {} ({})", infra.provider, infra.region);
            println!("  Cluster:    {}", infra.cluster_name);
            println!("  Endpoint:   {}", infra.endpoint);
            println!("  Nodes:      {}", infra.node_count);
            println!("  Created:    {}", infra.created_at.to_rfc3339());
        }
        None => println!("{}", "Infrastructure: not provisioned".dimmed()),
    }

    if let Some(endpoint) = &state.load_balancer_endpoint {
        println!("  Load balancer: {}", endpoint);
    }
    println!();

    match &state.database {
        Some(db) => {
            println!("{}", "Database".bold());
            println!("  Mode:       {}", db.mode);
            println!("  URL:        {}", db.connection_url);
        }
        None => println!("{}", "Database: not deployed".dimmed()),
    }
    println!();

    match &state.application {
        Some(app) => {
            println!("{}", "Application".bold());
            println!("  Deployed:   {}", flag(app.deployed));
            println!("  Version:    {}", app.version);
            println!("  Replicas:   {}", app.replicas);
            println!("  Broker:     {}", app.broker_address);
            println!("  Endpoint:   {}", app.endpoint);
        }
        None => println!("{}", "Application: not deployed".dimmed()),
    }
    println!();

    match &state.monitoring {
        Some(mon) => {
            println!("{}", "Monitoring".bold());
            println!("  Enabled:    {}", flag(mon.enabled));
            println!("  Provider:   {}", mon.provider);
            if let Some(url) = &mon.dashboard_url {
                println!("  Dashboards: {}", url);
            }
        }
        None => println!("{}", "Monitoring: not configured".dimmed()),
    }

    Ok(())
}
