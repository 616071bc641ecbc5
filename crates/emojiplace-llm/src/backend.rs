//! Core LLM backend trait.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// LLM-related errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Parsing failed: {0}")]
    ParseError(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Timeout after {0} seconds")]
    Timeout(u32),

    #[error("No reasoning gateway configured for agent {0}")]
    NoGateway(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Result type for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Configuration for LLM requests.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model name/identifier.
    pub model: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
            timeout_secs: 30,
        }
    }
}

impl LlmConfig {
    /// Create config for Claude.
    pub fn claude() -> Self {
        Self {
            model: "claude-3-5-sonnet-20241022".to_string(),
            ..Self::default()
        }
    }

    /// Create config for OpenAI.
    pub fn openai() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            ..Self::default()
        }
    }

    /// Create config for Ollama.
    pub fn ollama() -> Self {
        Self {
            model: "llama3.2".to_string(),
            timeout_secs: 60, // Local models can be slower
            ..Self::default()
        }
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set max tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout_secs: u32) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// A text-completion backend.
///
/// Backends know nothing about agents; the gateway turns an agent's context
/// into a prompt and the completion back into a decision.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Get the backend name.
    fn name(&self) -> &str;

    /// Get the current configuration.
    fn config(&self) -> &LlmConfig;

    /// Generate a completion for a prompt, optionally under a system prompt.
    async fn complete(&self, prompt: &str, system: Option<&str>) -> LlmResult<String>;

    /// Check if the backend is available.
    async fn health_check(&self) -> LlmResult<bool> {
        match self.complete("ping", None).await {
            Ok(_) => Ok(true),
            Err(LlmError::ConnectionFailed(_)) | Err(LlmError::AuthenticationFailed) => Ok(false),
            Err(_) => Ok(true),
        }
    }
}

/// Decision returned by [`MockBackend`] when no pattern matches: do nothing.
pub const IDLE_DECISION: &str = r#"{"thought": "Nothing to do.", "messages": [], "placePixel": null}"#;

/// A mock backend for testing and offline runs.
pub struct MockBackend {
    config: LlmConfig,
    responses: HashMap<String, String>,
    default_response: String,
    failure: Option<LlmError>,
}

impl MockBackend {
    /// Create a new mock backend.
    pub fn new() -> Self {
        Self {
            config: LlmConfig::default().with_model("mock"),
            responses: HashMap::new(),
            default_response: IDLE_DECISION.to_string(),
            failure: None,
        }
    }

    /// Add a canned response for a prompt pattern.
    pub fn with_response(mut self, pattern: &str, response: &str) -> Self {
        self.responses.insert(pattern.to_string(), response.to_string());
        self
    }

    /// Response used when no pattern matches.
    pub fn with_default_response(mut self, response: &str) -> Self {
        self.default_response = response.to_string();
        self
    }

    /// Fail every completion with `error`.
    pub fn failing(mut self, error: LlmError) -> Self {
        self.failure = Some(error);
        self
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn complete(&self, prompt: &str, _system: Option<&str>) -> LlmResult<String> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        for (pattern, response) in &self.responses {
            if prompt.contains(pattern) {
                return Ok(response.clone());
            }
        }
        Ok(self.default_response.clone())
    }
}

/// Build an HTTP client with the configured timeout.
#[cfg(any(feature = "api", feature = "local"))]
pub(crate) fn http_client(config: &LlmConfig) -> LlmResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_secs as u64))
        .build()
        .map_err(|e| LlmError::BackendUnavailable(format!("Failed to create HTTP client: {}", e)))
}

/// Map a transport-level reqwest failure.
#[cfg(any(feature = "api", feature = "local"))]
pub(crate) fn request_error(e: reqwest::Error, service: &str, config: &LlmConfig) -> LlmError {
    if e.is_connect() {
        LlmError::ConnectionFailed(format!("Cannot connect to {}", service))
    } else if e.is_timeout() {
        LlmError::Timeout(config.timeout_secs)
    } else {
        LlmError::ApiError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_backend() {
        let backend = MockBackend::new().with_response("agent a1", "{\"thought\":\"hi\"}");

        let response = backend.complete("state for agent a1", None).await.unwrap();
        assert_eq!(response, "{\"thought\":\"hi\"}");

        let response = backend.complete("state for agent a2", None).await.unwrap();
        assert_eq!(response, IDLE_DECISION);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let backend = MockBackend::new().failing(LlmError::RateLimited(60));
        assert_eq!(
            backend.complete("anything", None).await,
            Err(LlmError::RateLimited(60))
        );
        assert!(backend.health_check().await.unwrap());

        let offline = MockBackend::new().failing(LlmError::ConnectionFailed("down".into()));
        assert!(!offline.health_check().await.unwrap());
    }

    #[test]
    fn test_config_builders() {
        let claude = LlmConfig::claude();
        assert!(claude.model.contains("claude"));

        let openai = LlmConfig::openai();
        assert!(openai.model.contains("gpt"));

        let ollama = LlmConfig::ollama().with_temperature(5.0);
        assert!(ollama.model.contains("llama"));
        assert_eq!(ollama.temperature, 2.0);
        assert_eq!(ollama.timeout_secs, 60);
    }
}
