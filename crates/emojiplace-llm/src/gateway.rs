//! The reasoning gateway: agent context in, structured decision out.
//!
//! Each agent is served by whatever backend its configuration names. The
//! [`GatewayRouter`] holds one gateway per agent id plus an optional fallback,
//! so the orchestrator never branches on who it is talking to.

use crate::backend::{LlmBackend, LlmConfig, LlmError, LlmResult, MockBackend};
use crate::prompt::{parse_decision, DecisionPrompt, PromptTemplate};
use crate::types::{AgentDecision, DecisionRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Maps an agent's context to its next action.
#[async_trait]
pub trait ReasoningGateway: Send + Sync {
    fn name(&self) -> &str;

    async fn decide(&self, request: &DecisionRequest) -> LlmResult<AgentDecision>;

    /// Whether the gateway can currently be reached.
    async fn health_check(&self) -> LlmResult<bool> {
        Ok(true)
    }
}

/// A gateway that prompts an [`LlmBackend`] and parses the reply.
pub struct LlmGateway {
    backend: Arc<dyn LlmBackend>,
    peers: Vec<String>,
}

impl LlmGateway {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            peers: Vec::new(),
        }
    }

    /// Agent ids mentioned in the prompt as possible message recipients.
    pub fn with_peers(mut self, peers: Vec<String>) -> Self {
        self.peers = peers;
        self
    }

    pub fn backend(&self) -> &Arc<dyn LlmBackend> {
        &self.backend
    }
}

#[async_trait]
impl ReasoningGateway for LlmGateway {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn decide(&self, request: &DecisionRequest) -> LlmResult<AgentDecision> {
        let peers = self
            .peers
            .iter()
            .filter(|p| **p != request.agent_id)
            .cloned()
            .collect();
        let prompt = DecisionPrompt::new(request).with_peers(peers);
        let system = prompt.system_prompt();

        let response = self
            .backend
            .complete(&prompt.generate(), system.as_deref())
            .await?;
        debug!("{} replied for {}: {}", self.backend.name(), request.agent_id, response);

        parse_decision(&response)
    }

    async fn health_check(&self) -> LlmResult<bool> {
        self.backend.health_check().await
    }
}

/// Which backend serves an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Claude,
    OpenAi,
    Ollama,
    #[default]
    Mock,
}

/// Backend settings for one agent, as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub backend: BackendKind,
    /// Model name; each backend has its own default.
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL for Ollama or an OpenAI-compatible server.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub timeout_secs: Option<u32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Canned reply for the mock backend.
    #[serde(default)]
    pub response: Option<String>,
}

impl BackendConfig {
    pub fn mock() -> Self {
        Self::default()
    }

    pub fn of(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    #[cfg_attr(not(any(feature = "api", feature = "local")), allow(dead_code))]
    fn llm_config(&self, base: LlmConfig) -> LlmConfig {
        let mut config = base;
        if let Some(model) = &self.model {
            config = config.with_model(model.clone());
        }
        if let Some(t) = self.temperature {
            config = config.with_temperature(t);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(secs);
        }
        if let Some(max_tokens) = self.max_tokens {
            config = config.with_max_tokens(max_tokens);
        }
        config
    }
}

/// Build the backend a config entry describes.
///
/// Fails if the backend's cargo feature is disabled or its key is missing.
pub fn create_backend(config: &BackendConfig) -> LlmResult<Arc<dyn LlmBackend>> {
    match config.backend {
        BackendKind::Mock => {
            let mut backend = MockBackend::new();
            if let Some(response) = &config.response {
                backend = backend.with_default_response(response);
            }
            Ok(Arc::new(backend))
        }

        #[cfg(feature = "api")]
        BackendKind::Claude => {
            let var = config.api_key_env.as_deref().unwrap_or("ANTHROPIC_API_KEY");
            let backend =
                crate::claude::ClaudeBackend::from_env(var, config.llm_config(LlmConfig::claude()))?;
            Ok(Arc::new(backend))
        }

        #[cfg(feature = "api")]
        BackendKind::OpenAi => {
            let var = config.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY");
            let mut backend =
                crate::openai::OpenAiBackend::from_env(var, config.llm_config(LlmConfig::openai()))?;
            if let Some(endpoint) = &config.endpoint {
                backend = backend.with_endpoint(endpoint);
            }
            Ok(Arc::new(backend))
        }

        #[cfg(feature = "local")]
        BackendKind::Ollama => {
            let endpoint = config
                .endpoint
                .as_deref()
                .unwrap_or("http://localhost:11434");
            let backend = crate::ollama::OllamaBackend::with_config(
                endpoint,
                config.llm_config(LlmConfig::ollama()),
            )?;
            Ok(Arc::new(backend))
        }

        #[allow(unreachable_patterns)]
        other => Err(LlmError::BackendUnavailable(format!(
            "{:?} backend not compiled in (enable the `api` or `local` feature)",
            other
        ))),
    }
}

/// Per-agent gateway lookup.
#[derive(Default, Clone)]
pub struct GatewayRouter {
    routes: HashMap<String, Arc<dyn ReasoningGateway>>,
    fallback: Option<Arc<dyn ReasoningGateway>>,
}

impl GatewayRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `agent_id` with `gateway`.
    pub fn with_route(mut self, agent_id: impl Into<String>, gateway: Arc<dyn ReasoningGateway>) -> Self {
        self.routes.insert(agent_id.into(), gateway);
        self
    }

    /// Serve every agent without its own route with `gateway`.
    pub fn with_fallback(mut self, gateway: Arc<dyn ReasoningGateway>) -> Self {
        self.fallback = Some(gateway);
        self
    }

    /// Build a router from per-agent backend configs. Every gateway is told
    /// about the whole roster so agents know whom they can message.
    pub fn from_configs(
        configs: &HashMap<String, BackendConfig>,
        fallback: Option<&BackendConfig>,
        roster: &[String],
    ) -> LlmResult<Self> {
        let gateway = |config: &BackendConfig| -> LlmResult<Arc<dyn ReasoningGateway>> {
            let backend = create_backend(config)?;
            Ok(Arc::new(LlmGateway::new(backend).with_peers(roster.to_vec())))
        };

        let mut router = Self::new();
        for (agent_id, config) in configs {
            router = router.with_route(agent_id.clone(), gateway(config)?);
        }
        if let Some(config) = fallback {
            router = router.with_fallback(gateway(config)?);
        }
        Ok(router)
    }

    /// The gateway serving `agent_id`, if any.
    pub fn route(&self, agent_id: &str) -> Option<Arc<dyn ReasoningGateway>> {
        self.routes
            .get(agent_id)
            .or(self.fallback.as_ref())
            .cloned()
    }
}

#[async_trait]
impl ReasoningGateway for GatewayRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn decide(&self, request: &DecisionRequest) -> LlmResult<AgentDecision> {
        let gateway = self
            .route(&request.agent_id)
            .ok_or_else(|| LlmError::NoGateway(request.agent_id.clone()))?;
        gateway.decide(request).await
    }

    /// Healthy only if every configured gateway is. Each unreachable one is
    /// logged by agent id (`*` for the fallback).
    async fn health_check(&self) -> LlmResult<bool> {
        let gateways = self
            .routes
            .iter()
            .map(|(id, g)| (id.as_str(), g))
            .chain(self.fallback.iter().map(|g| ("*", g)));

        let mut healthy = true;
        for (agent_id, gateway) in gateways {
            match gateway.health_check().await {
                Ok(true) => debug!("Gateway {} for {} is reachable", gateway.name(), agent_id),
                Ok(false) => {
                    warn!("Gateway {} for {} is unreachable", gateway.name(), agent_id);
                    healthy = false;
                }
                Err(e) => {
                    warn!("Gateway {} for {} failed its health check: {}", gateway.name(), agent_id, e);
                    healthy = false;
                }
            }
        }
        Ok(healthy)
    }
}
