//! Pipeline orchestrator - owns the broker connection for the process lifetime.
//!
//! The AMQP client is behind the `amqp` feature; without it `run` fails
//! immediately.

use std::future::Future;

use anyhow::Result;
use contracts::RelayBlueprint;

use super::PipelineStats;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated relay configuration
    pub blueprint: RelayBlueprint,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Connects, runs the relay, and tears down
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves or the source queue is cancelled
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        #[cfg(feature = "amqp")]
        return self.run_amqp(shutdown).await;

        #[cfg(not(feature = "amqp"))]
        {
            drop(shutdown);
            anyhow::bail!(
                "route '{}' cannot run: built without the `amqp` feature",
                self.config.blueprint.route.id
            )
        }
    }

    #[cfg(feature = "amqp")]
    async fn run_amqp<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        use std::time::Instant;

        use anyhow::Context;
        use broker::AmqpBroker;
        use relay::{ConsoleReporter, FanOutDispatcher, Relay};
        use tracing::{info, warn};

        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;
        let route = &blueprint.route;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        info!(url = %blueprint.broker.redacted_url(), "Connecting to broker...");
        let broker = AmqpBroker::connect(&blueprint.broker)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to broker at {}",
                    blueprint.broker.redacted_url()
                )
            })?;

        if blueprint.broker.declare_queues {
            broker.declare(&route.source).await?;
            for queue in &route.destinations {
                broker.declare(queue).await?;
            }
            info!(queues = route.destinations.len() + 1, "Queues declared");
        }

        let consumer = broker
            .consumer(&route.source, blueprint.broker.ack_mode)
            .await
            .with_context(|| format!("Failed to consume from '{}'", route.source))?;

        let relay = Relay::new(
            route.id.clone(),
            consumer,
            FanOutDispatcher::new(broker.publisher(), route.destinations.clone()),
            ConsoleReporter::stdout(),
            blueprint.broker.ack_mode,
        );

        info!(route = %route.id, "Relay running");
        let relay_stats = relay.run(shutdown).await;

        if let Err(e) = broker.close().await {
            warn!(error = %e, "Failed to close broker connection cleanly");
        }

        Ok(PipelineStats {
            relay: relay_stats,
            duration: start_time.elapsed(),
        })
    }
}
