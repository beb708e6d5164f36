//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::{info, warn};

use contracts::RelayBlueprint;

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    let blueprint = load_blueprint(args)?;

    info!(
        route = %blueprint.route.id,
        source = %blueprint.route.source,
        destinations = blueprint.route.destinations.len(),
        ack_mode = ?blueprint.broker.ack_mode,
        "Configuration loaded"
    );

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
    });

    println!("Press Ctrl+C to terminate");

    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Relay execution failed")?;

    info!(
        received = stats.relay.counters.received,
        forwarded = stats.relay.counters.forwarded,
        rejected = stats.relay.counters.rejected,
        duration_secs = stats.duration.as_secs_f64(),
        "Relay finished"
    );
    stats.print_summary();

    Ok(())
}

/// Load configuration (or defaults) and apply command-line overrides
fn load_blueprint(args: &RunArgs) -> Result<RelayBlueprint> {
    if let Some(ref path) = args.config {
        info!(config = %path.display(), "Loading configuration");
    } else {
        info!("No configuration file given, using built-in route");
    }

    let mut blueprint = config_loader::ConfigLoader::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    if let Some(ref url) = args.broker_url {
        blueprint.broker.url = url.clone();
        info!(url = %blueprint.broker.redacted_url(), "Overriding broker URL from CLI");
    }
    if let Some(mode) = args.ack_mode {
        blueprint.broker.ack_mode = mode.into();
        info!(ack_mode = ?blueprint.broker.ack_mode, "Overriding ack mode from CLI");
    }

    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after applying overrides")?;

    Ok(blueprint)
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Received shutdown signal, stopping relay...");
}
