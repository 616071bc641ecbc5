//! Application state for the web server.
//!
//! Builds the stores, the placement pipeline and (optionally) the agent
//! orchestrator from a [`Config`], and hands them to every handler.

use crate::config::Config;
use crate::transport::SocketTransport;
use anyhow::{Context, Result};
use emojiplace_agents::orchestrator::AgentOrchestrator;
use emojiplace_core::clock::{Clock, SystemClock};
use emojiplace_llm::GatewayRouter;
use emojiplace_runtime::pipeline::PlacementPipeline;
use emojiplace_store::{KvStore, MemoryKv, MemoryPixelStore, PixelStore, SqlitePixelStore};
use std::sync::Arc;
use tracing::info;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PlacementPipeline>,
    pub transport: Arc<SocketTransport>,
    pub orchestrator: Option<Arc<AgentOrchestrator>>,
}

impl AppState {
    /// Build state from configuration using the system clock.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new(clock.clone()));

        let pixels: Arc<dyn PixelStore> = match &config.storage.sqlite_path {
            Some(path) => {
                info!("Durable pixel store: {}", path.display());
                Arc::new(
                    SqlitePixelStore::open(path)
                        .with_context(|| format!("Failed to open {}", path.display()))?,
                )
            }
            None => {
                info!("Durable pixel store: in-memory");
                Arc::new(MemoryPixelStore::new())
            }
        };

        let transport = Arc::new(SocketTransport::new());
        let pipeline = Arc::new(PlacementPipeline::new(
            &config.canvas,
            kv.clone(),
            pixels,
            transport.clone(),
            clock,
        ));

        let orchestrator = if config.agents.enabled {
            let agents = &config.agents;
            let gateway = GatewayRouter::from_configs(
                &agents.gateways,
                agents.fallback.as_ref(),
                &agents.roster_ids(),
            )
            .context("Failed to build reasoning gateways")?;
            info!("Agents enabled: {}", agents.roster_ids().join(", "));
            Some(Arc::new(AgentOrchestrator::new(
                agents.roster.clone(),
                kv,
                pipeline.clone(),
                Arc::new(gateway),
                agents.orchestrator(),
            )))
        } else {
            None
        };

        Ok(Self {
            pipeline,
            transport,
            orchestrator,
        })
    }
}
