//! HostWatch Agent - host health sampler
//!
//! Samples CPU, memory and CPU temperature on a fixed interval and pushes
//! each sample to the kernel over HTTP:
//! - One timer and one shutdown signal are the only suspension points
//! - A tick samples then pushes inline, ticks never overlap
//! - A failed push is logged and dropped, never retried

mod client;
mod config;
mod metrics;

use anyhow::{Context, Result};
use client::PushClient;
use config::AgentConfig;
use metrics::Collector;
use std::future::Future;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Main agent state
struct Agent {
    config: AgentConfig,
    collector: Collector,
    client: PushClient,
}

impl Agent {
    fn new(config: AgentConfig) -> Result<Self> {
        let client = PushClient::new(&config.server.url, &config.agent.node_name, config.timeout())
            .context("Failed to build HTTP client")?;
        let collector = Collector::new(config.collector.clone());

        Ok(Agent { config, collector, client })
    }

    /// Run until `shutdown` resolves; checked between ticks only
    async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        info!("Node name: {}", self.config.agent.node_name);
        info!("Server: {}", self.client.url());
        info!("Interval: {}s", self.config.agent.interval_secs);

        match self.client.test_connection().await {
            Ok(status) => info!("Server reachable (HTTP {})", status.as_u16()),
            Err(e) => warn!("Cannot reach server: {} - will keep trying on each tick", e),
        }

        let mut ticker = interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping agent");
                    break;
                }
                _ = ticker.tick() => {
                    self.collect_and_send().await;
                }
            }
        }
    }

    async fn collect_and_send(&mut self) {
        let sample = match self.collector.collect().await {
            Ok(sample) => sample,
            Err(e) => {
                error!("Sampling failed: {:#}", e);
                return;
            }
        };

        info!(
            "Sampled - CPU: {:.2}%, memory: {:.2}% ({:.2}GB/{:.2}GB), CPU temp: {:.1}°C",
            sample.cpu_percent,
            sample.memory_percent,
            sample.memory_used as f64 / 1024.0 / 1024.0 / 1024.0,
            sample.memory_total as f64 / 1024.0 / 1024.0 / 1024.0,
            sample.cpu_temp
        );

        match self.client.push(&sample).await {
            Ok(()) => info!("Sample sent"),
            Err(e) => error!("Push failed: {}", e),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Ctrl-C handler failed: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("SIGTERM handler failed: {}", e);
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
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hostwatch_agent=info")))
        .init();

    info!("HostWatch Agent v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = AgentConfig::load().await.context("Failed to load configuration")?;
    let mut agent = Agent::new(config).context("Failed to create agent")?;

    agent.run(shutdown_signal()).await;
    info!("HostWatch Agent stopped");
    Ok(())
}
