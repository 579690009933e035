//! Skipper - Entry Point
//!
//! Deploys a project to managed Kubernetes on AWS, GCP or Azure:
//! infrastructure, core services, database, event bus, observability,
//! the application itself, then DNS and TLS verification.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use skipper::cancel::CancelSignal;
use skipper::commands::{deploy, destroy, logs, status, upgrade};
use skipper::logs::{init_logging, LogLevel, LogOptions};
use skipper::storage::layout::StorageLayout;

use tracing::{error, info};

const USAGE: &str = "Usage: skipper <command> [options]

Commands:
  deploy                     Run the full deployment pipeline
  destroy                    Remove installed subsystems
  status                     Show what is currently deployed
  logs [component]           Stream component logs
  upgrade <list|status|run>  Manage application versions

Options:
  --home=<dir>         State directory (default ~/.skipper)
  --config=<file>      Configuration file (default <home>/config.json)
  --verbose            Debug logging; implies no interactive prompts
  --log-level=<level>  trace, debug, info, warn or error
  --app-version=<v>    Version to deploy or upgrade to
  --yes                Never prompt; assume safe defaults
  --cluster            destroy: also tear down the cluster
  --force              destroy: skip the confirmation prompt
  --follow             logs: stream continuously
  --tail=<n>, -t <n>   logs: line count to start from
  --version            Print version information";

/// Options that consume the following argument in `--flag value` form
const VALUE_FLAGS: [&str; 6] = ["home", "config", "log-level", "app-version", "tail", "t"];

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut flags: HashMap<String, String> = HashMap::new();
    let mut positional: Vec<String> = Vec::new();

    let mut iter = args.iter().skip(1).peekable();
    while let Some(arg) = iter.next() {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            flags.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with('-') {
            let clean_key = arg.trim_start_matches('-');
            // Value-taking options also accept the space-separated form,
            // e.g. `-t 50` or `--config deploy.json`
            let value = if VALUE_FLAGS.contains(&clean_key) {
                match iter.peek() {
                    Some(next) if !next.starts_with('-') => iter.next().unwrap().clone(),
                    _ => "true".to_string(),
                }
            } else {
                "true".to_string()
            };
            flags.insert(clean_key.to_string(), value);
        } else {
            positional.push(arg.clone());
        }
    }

    // Print version and exit
    if flags.contains_key("version") || flags.contains_key("V") {
        println!(
            "skipper {} ({} {})",
            env!("CARGO_PKG_VERSION"),
            env!("GIT_HASH"),
            env!("BUILD_TIME")
        );
        return;
    }

    // Initialize logging
    let verbose = flags.contains_key("verbose") || flags.contains_key("v");
    let log_level = flags
        .get("log-level")
        .and_then(|v| LogLevel::from_str(v).ok())
        .unwrap_or(if verbose { LogLevel::Debug } else { LogLevel::Info });
    let log_options = LogOptions {
        log_level,
        stderr: true,
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let layout = match flags.get("home") {
        Some(dir) => StorageLayout::new(dir),
        None => StorageLayout::default(),
    };

    // Cancellation propagates into every bounded wait
    let cancel = CancelSignal::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            await_shutdown_signal().await;
            cancel.cancel();
        });
    }

    let config_path = flags.get("config").map(String::as_str);

    let command = positional.first().map(String::as_str).unwrap_or("");
    let result = match command {
        "deploy" => {
            let version = flags.get("app-version").map(String::as_str).unwrap_or("latest");
            // Verbose runs are assumed unattended; never block on a prompt
            let interactive = !flags.contains_key("yes") && !verbose;
            deploy::deploy(layout, config_path, version, interactive, cancel).await
        }
        "destroy" => {
            destroy::destroy(
                layout,
                config_path,
                flags.contains_key("cluster"),
                flags.contains_key("force") || flags.contains_key("yes"),
            )
            .await
        }
        "status" => status::status(layout, config_path).await,
        "logs" => {
            let component = positional.get(1).map(String::as_str);
            let tail = flags
                .get("tail")
                .or_else(|| flags.get("t"))
                .and_then(|v| v.parse::<u32>().ok());
            let follow = flags.contains_key("follow") || flags.contains_key("f");
            logs::logs(layout, config_path, component, follow, tail).await
        }
        "upgrade" => match positional.get(1).map(String::as_str) {
            Some("list") => {
                upgrade::list();
                Ok(())
            }
            Some("status") | None => upgrade::status(layout).await,
            Some("run") => {
                let version = positional
                    .get(2)
                    .map(String::as_str)
                    .or_else(|| flags.get("app-version").map(String::as_str))
                    .unwrap_or("latest");
                upgrade::run(layout, config_path, version, cancel.clone()).await
            }
            Some(other) => {
                eprintln!("Unknown upgrade action: {}", other);
                eprintln!("{}", USAGE);
                std::process::exit(2);
            }
        },
        "" => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        error!("{} failed: {}", command, e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).unwrap();
        let mut sigint = signal(SignalKind::interrupt()).unwrap();

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, cancelling...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, cancelling...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, cancelling...");
    }
}
