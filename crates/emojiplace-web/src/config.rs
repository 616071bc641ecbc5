//! Configuration for the EmojiPlace server.
//!
//! Read from `emojiplace.toml` in the current or a parent directory, or from
//! an explicit path. Every field has a default, so an empty file (or no file)
//! is a valid configuration.

use anyhow::{Context, Result};
use emojiplace_agents::orchestrator::OrchestratorConfig;
use emojiplace_agents::profile::{default_roster, AgentProfile};
use emojiplace_core::config::CanvasConfig;
use emojiplace_llm::BackendConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "emojiplace.toml";

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub canvas: CanvasConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file for the durable pixel store. In-memory when unset.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_decision_timeout_secs")]
    pub decision_timeout_secs: u64,
    #[serde(default = "default_lease_margin_secs")]
    pub lease_margin_secs: u64,
    #[serde(default = "default_retention_bound")]
    pub retention_bound: usize,
    #[serde(default = "default_retention_every")]
    pub retention_every: u64,
    #[serde(default)]
    pub view_radius: i64,
    #[serde(default = "default_roster")]
    pub roster: Vec<AgentProfile>,
    /// Backend per agent id.
    #[serde(default)]
    pub gateways: HashMap<String, BackendConfig>,
    /// Backend for agents without an entry in `gateways`.
    #[serde(default = "default_fallback")]
    pub fallback: Option<BackendConfig>,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 3001 }
fn default_true() -> bool { true }
fn default_interval_secs() -> u64 { 60 }
fn default_decision_timeout_secs() -> u64 { 30 }
fn default_lease_margin_secs() -> u64 { 30 }
fn default_retention_bound() -> usize { 100 }
fn default_retention_every() -> u64 { 10 }
fn default_fallback() -> Option<BackendConfig> { Some(BackendConfig::mock()) }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_interval_secs(),
            decision_timeout_secs: default_decision_timeout_secs(),
            lease_margin_secs: default_lease_margin_secs(),
            retention_bound: default_retention_bound(),
            retention_every: default_retention_every(),
            view_radius: 0,
            roster: default_roster(),
            gateways: HashMap::new(),
            fallback: default_fallback(),
        }
    }
}

impl AgentsConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            decision_timeout: Duration::from_secs(self.decision_timeout_secs),
            lease_margin: Duration::from_secs(self.lease_margin_secs),
            retention_bound: self.retention_bound,
            retention_every: self.retention_every,
            view_radius: self.view_radius,
        }
    }

    pub fn roster_ids(&self) -> Vec<String> {
        self.roster.iter().map(|p| p.id.clone()).collect()
    }
}

impl Config {
    /// Load from `path`, or from `emojiplace.toml` found upward from the
    /// current directory, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path.map(Path::to_path_buf).or_else(find_config_file) {
            Some(path) => Self::from_file(&path),
            None => Ok(Config::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Generate default config as TOML string.
    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Config::default()).context("Failed to serialize config")
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Find emojiplace.toml in current or parent directories.
fn find_config_file() -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }
        if !dir.pop() {
            return None;
        }
    }
}
