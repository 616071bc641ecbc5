//! The agent orchestrator.
//!
//! One run visits every agent on the roster concurrently. For each agent it
//! loads memory, observes the canvas around the agent's interest point, asks
//! the reasoning gateway for a decision, applies the decision through the
//! placement pipeline, routes outgoing messages and saves memory.
//!
//! Agents never share a failure: a gateway error or timeout turns into a
//! no-op decision, and any store error ends that agent's turn only.
//! Each agent's turn runs under a lease on `agent:{id}`, so overlapping runs
//! (in this process or another) skip an agent that is already busy.

use crate::memory::{AgentMemory, AgentMemoryStore, MessageLog};
use crate::profile::AgentProfile;
use emojiplace_core::event::CanvasEvent;
use emojiplace_core::types::{AgentMessage, Coord, Pixel};
use emojiplace_llm::{AgentDecision, DecisionRequest, LlmError, ReasoningGateway};
use emojiplace_runtime::lease::LeaseManager;
use emojiplace_runtime::pipeline::{PlaceRequest, PlacementPipeline};
use emojiplace_store::{KvStore, StoreError};
use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Longest a single reasoning call may take.
    pub decision_timeout: Duration,
    /// Added to the decision timeout to get the agent lease's ttl.
    pub lease_margin: Duration,
    /// Messages kept in the log after retention.
    pub retention_bound: usize,
    /// Retention runs on every n-th orchestrator run; 0 disables it.
    pub retention_every: u64,
    /// Rings of neighbouring chunks an agent sees around its own.
    pub view_radius: i64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            decision_timeout: Duration::from_secs(30),
            lease_margin: Duration::from_secs(30),
            retention_bound: 100,
            retention_every: 10,
            view_radius: 0,
        }
    }
}

impl OrchestratorConfig {
    pub fn agent_lease_ttl(&self) -> Duration {
        self.decision_timeout + self.lease_margin
    }
}

/// Errors that end one agent's turn.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Canvas unavailable: {0}")]
    Canvas(String),
}

/// What one agent did during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTurn {
    pub thought: String,
    /// Set when reasoning failed or timed out and a no-op was used instead.
    pub degraded: Option<String>,
    pub placed: Option<Pixel>,
    pub placement_error: Option<String>,
    pub messages_sent: usize,
    pub messages_dropped: usize,
    pub inbox_read: usize,
}

/// How an agent's turn ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentOutcome {
    Completed(AgentTurn),
    /// Another run holds the agent's lease.
    Skipped,
    Failed { error: String },
}

/// Result of one orchestrator run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run: u64,
    pub agents: Vec<(String, AgentOutcome)>,
    /// Messages purged by retention, if retention ran.
    pub retention_purged: Option<usize>,
}

impl RunReport {
    pub fn outcome(&self, agent_id: &str) -> Option<&AgentOutcome> {
        self.agents
            .iter()
            .find(|(id, _)| id == agent_id)
            .map(|(_, outcome)| outcome)
    }
}

/// Drives the roster through the placement pipeline.
pub struct AgentOrchestrator {
    roster: Vec<AgentProfile>,
    memories: AgentMemoryStore,
    log: MessageLog,
    pipeline: Arc<PlacementPipeline>,
    gateway: Arc<dyn ReasoningGateway>,
    leases: LeaseManager,
    config: OrchestratorConfig,
    runs: AtomicU64,
}

impl AgentOrchestrator {
    pub fn new(
        roster: Vec<AgentProfile>,
        kv: Arc<dyn KvStore>,
        pipeline: Arc<PlacementPipeline>,
        gateway: Arc<dyn ReasoningGateway>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            roster,
            memories: AgentMemoryStore::new(kv.clone()),
            log: MessageLog::new(kv.clone()),
            pipeline,
            gateway,
            leases: LeaseManager::new(kv, config.agent_lease_ttl()),
            config,
            runs: AtomicU64::new(0),
        }
    }

    pub fn roster(&self) -> &[AgentProfile] {
        &self.roster
    }

    pub fn memories(&self) -> &AgentMemoryStore {
        &self.memories
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn gateway(&self) -> &Arc<dyn ReasoningGateway> {
        &self.gateway
    }

    /// Run every agent once, concurrently.
    pub async fn run_once(&self) -> RunReport {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Orchestrator run {} over {} agents", run, self.roster.len());

        let turns = self.roster.iter().map(|profile| async move {
            (profile.id.clone(), self.run_agent(profile).await)
        });
        let agents = join_all(turns).await;

        let retention_purged = if self.config.retention_every > 0
            && run % self.config.retention_every == 0
        {
            match self.log.retain_latest(self.config.retention_bound).await {
                Ok(purged) => {
                    debug!("Retention purged {} messages", purged);
                    Some(purged)
                }
                Err(e) => {
                    warn!("Message retention failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        RunReport {
            run,
            agents,
            retention_purged,
        }
    }

    /// Run one agent's turn under its lease.
    pub async fn run_agent(&self, profile: &AgentProfile) -> AgentOutcome {
        let lease = match self.leases.try_acquire(&format!("agent:{}", profile.id)).await {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                debug!("Skipping {}: already running", profile.id);
                return AgentOutcome::Skipped;
            }
            Err(e) => {
                error!("Could not lease agent {}: {}", profile.id, e);
                return AgentOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let outcome = match self.take_turn(profile).await {
            Ok(turn) => AgentOutcome::Completed(turn),
            Err(e) => {
                error!("Agent {} failed: {}", profile.id, e);
                AgentOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        if let Err(e) = self.leases.release(lease).await {
            warn!("Failed to release lease for agent {}: {}", profile.id, e);
        }
        outcome
    }

    /// Run forever, one run per `every`.
    pub async fn run_every(self: Arc<Self>, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let report = self.run_once().await;
            let completed = report
                .agents
                .iter()
                .filter(|(_, o)| matches!(o, AgentOutcome::Completed(_)))
                .count();
            info!(
                "Agent run {}: {}/{} agents completed",
                report.run,
                completed,
                report.agents.len()
            );
        }
    }

    async fn take_turn(&self, profile: &AgentProfile) -> Result<AgentTurn, AgentError> {
        // Load
        let mut memory = match self.memories.load(&profile.id).await? {
            Some(memory) => memory,
            None => {
                info!("Initialising memory for agent {}", profile.id);
                profile.initial_memory()
            }
        };
        let inbox = self.memories.inbox(&profile.id).await?;
        memory.inbox = inbox.messages;

        // Observe
        let observed = self.observe(&memory).await?;

        // Decide
        let (decision, degraded) = self.decide(&memory, observed).await;
        let mut turn = AgentTurn {
            thought: decision.thought.clone(),
            degraded,
            inbox_read: inbox.entries,
            ..AgentTurn::default()
        };

        // Act
        memory.scratchpad = decision.thought;
        if let Some(action) = decision.place_pixel {
            let mut request = PlaceRequest::new(&profile.id, action.x, action.y, action.mark);
            request.display_name = profile.display_name.clone();
            match self.pipeline.place(request).await {
                Ok(placement) => {
                    memory.set_interest(placement.pixel.coord());
                    turn.placed = Some(placement.pixel);
                }
                Err(e) => {
                    warn!("Agent {} placement rejected: {}", profile.id, e);
                    turn.placement_error = Some(e.to_string());
                }
            }
        }

        // Route messages
        self.memories.drop_read(&profile.id, inbox.entries).await?;
        memory.inbox.clear();
        for outgoing in decision.messages {
            if !self.roster.iter().any(|p| p.id == outgoing.to) {
                warn!("Agent {} messaged unknown agent {}; dropped", profile.id, outgoing.to);
                turn.messages_dropped += 1;
                continue;
            }
            let message = AgentMessage::new(
                &profile.id,
                outgoing.to,
                outgoing.content,
                self.pipeline.clock().now_millis(),
            );
            self.memories.deliver(&message).await?;
            self.log.append(&message).await?;
            self.pipeline
                .broadcaster()
                .broadcast(&CanvasEvent::AgentMessage(message))
                .await;
            turn.messages_sent += 1;
        }

        // Persist
        self.memories.save(&memory).await?;
        Ok(turn)
    }

    async fn observe(&self, memory: &AgentMemory) -> Result<Vec<Pixel>, AgentError> {
        let cache = self.pipeline.cache();
        let center = cache.chunk_of(Coord::new(memory.interest_x, memory.interest_y));

        let mut pixels = Vec::new();
        for id in center.neighborhood(self.config.view_radius.max(0)) {
            let chunk = cache
                .read_chunk(id)
                .await
                .map_err(|e| AgentError::Canvas(e.to_string()))?;
            pixels.extend(chunk.into_pixels());
        }
        Ok(pixels)
    }

    async fn decide(&self, memory: &AgentMemory, observed: Vec<Pixel>) -> (AgentDecision, Option<String>) {
        let request = DecisionRequest {
            agent_id: memory.agent_id.clone(),
            plan: memory.plan.clone(),
            scratchpad: memory.scratchpad.clone(),
            inbox: memory.inbox.clone(),
            observed_pixels: observed,
        };

        let timeout = self.config.decision_timeout;
        let error = match tokio::time::timeout(timeout, self.gateway.decide(&request)).await {
            Ok(Ok(decision)) => return (decision, None),
            Ok(Err(e)) => e,
            Err(_) => LlmError::Timeout(timeout.as_secs() as u32),
        };

        warn!("Reasoning failed for {}: {}", memory.agent_id, error);
        (AgentDecision::noop(&error), Some(error.to_string()))
    }
}
