//! What goes into and comes out of a reasoning call.

use emojiplace_core::types::{AgentMessage, Pixel};
use serde::{Deserialize, Serialize};

/// Everything an agent knows when it decides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub agent_id: String,
    pub plan: String,
    pub scratchpad: String,
    pub inbox: Vec<AgentMessage>,
    pub observed_pixels: Vec<Pixel>,
}

/// A message the agent wants to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub to: String,
    pub content: String,
}

/// A mark the agent wants to place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelAction {
    pub x: i64,
    pub y: i64,
    #[serde(alias = "emoji")]
    pub mark: String,
}

/// The structured action returned by a reasoning call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDecision {
    #[serde(default)]
    pub thought: String,
    #[serde(default)]
    pub messages: Vec<OutgoingMessage>,
    #[serde(default)]
    pub place_pixel: Option<PixelAction>,
}

impl AgentDecision {
    /// The do-nothing decision substituted when reasoning fails.
    pub fn noop(reason: impl std::fmt::Display) -> Self {
        Self {
            thought: format!("Encountered an error: {}", reason),
            messages: Vec::new(),
            place_pixel: None,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.messages.is_empty() && self.place_pixel.is_none()
    }
}
