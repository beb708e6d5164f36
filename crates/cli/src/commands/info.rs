//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{AckMode, RelayBlueprint};

use crate::cli::InfoArgs;

/// Effective route for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    broker: BrokerInfo,
    route: RouteInfo,
}

#[derive(Serialize)]
struct BrokerInfo {
    url: String,
    connection_name: String,
    ack_mode: AckMode,
    declare_queues: bool,
}

#[derive(Serialize)]
struct RouteInfo {
    id: String,
    source: String,
    destinations: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    match args.config {
        Some(ref path) => info!(config = %path.display(), "Loading configuration info"),
        None => info!("Showing built-in route"),
    }

    let blueprint = config_loader::ConfigLoader::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    if args.json {
        let info = build_config_info(&blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &RelayBlueprint) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        broker: BrokerInfo {
            url: blueprint.broker.redacted_url(),
            connection_name: blueprint.broker.connection_name.clone(),
            ack_mode: blueprint.broker.ack_mode,
            declare_queues: blueprint.broker.declare_queues,
        },
        route: RouteInfo {
            id: blueprint.route.id.clone(),
            source: blueprint.route.source.to_string(),
            destinations: blueprint
                .route
                .destinations
                .iter()
                .map(ToString::to_string)
                .collect(),
        },
    }
}

fn print_config_info(blueprint: &RelayBlueprint) {
    println!("\n=== Route {} ===\n", blueprint.route.id);
    println!("Broker:");
    println!("  URL: {}", blueprint.broker.redacted_url());
    println!("  Connection name: {}", blueprint.broker.connection_name);
    println!("  Ack mode: {:?}", blueprint.broker.ack_mode);
    println!("  Declare queues: {}", blueprint.broker.declare_queues);

    println!("\nSource: {}", blueprint.route.source);
    println!("Destinations ({}):", blueprint.route.destinations.len());
    for queue in &blueprint.route.destinations {
        println!("  - {}", queue);
    }
    println!();
}
