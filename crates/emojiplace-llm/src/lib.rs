//! # EmojiPlace LLM
//!
//! Reasoning for EmojiPlace agents.
//!
//! An agent's plan, scratchpad, inbox and surroundings go in; a thought,
//! outgoing messages and at most one pixel come out. The
//! [`ReasoningGateway`] trait is that contract. [`LlmGateway`] fulfils it
//! with any [`LlmBackend`], and [`GatewayRouter`] picks the gateway by
//! agent id from configuration.
//!
//! ## Features
//!
//! - `api`: Cloud API backends (Claude, OpenAI)
//! - `local`: Local backends (Ollama)
//! - `full`: All backends
//!
//! The mock backend is always available.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use emojiplace_llm::prelude::*;
//! use std::sync::Arc;
//!
//! let gateway = LlmGateway::new(Arc::new(OllamaBackend::localhost()?));
//! let decision = gateway.decide(&request).await?;
//! ```

mod backend;
mod gateway;
mod prompt;
mod types;

pub use backend::{LlmBackend, LlmConfig, LlmError, LlmResult, MockBackend, IDLE_DECISION};
pub use gateway::{
    create_backend, BackendConfig, BackendKind, GatewayRouter, LlmGateway, ReasoningGateway,
};
pub use prompt::{parse_decision, DecisionPrompt, PromptTemplate};
pub use types::{AgentDecision, DecisionRequest, OutgoingMessage, PixelAction};

#[cfg(feature = "local")]
mod ollama;
#[cfg(feature = "local")]
pub use ollama::OllamaBackend;

#[cfg(feature = "api")]
mod claude;
#[cfg(feature = "api")]
pub use claude::ClaudeBackend;

#[cfg(feature = "api")]
mod openai;
#[cfg(feature = "api")]
pub use openai::OpenAiBackend;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{LlmBackend, LlmConfig, LlmError, LlmResult, MockBackend};
    pub use crate::{AgentDecision, DecisionRequest, OutgoingMessage, PixelAction};
    pub use crate::{BackendConfig, BackendKind, GatewayRouter, LlmGateway, ReasoningGateway};

    #[cfg(feature = "local")]
    pub use crate::OllamaBackend;

    #[cfg(feature = "api")]
    pub use crate::{ClaudeBackend, OpenAiBackend};
}
