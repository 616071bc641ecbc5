//! Decision prompt and response parsing.

use crate::backend::{LlmError, LlmResult};
use crate::types::{AgentDecision, DecisionRequest};

/// A prompt template for LLM requests.
pub trait PromptTemplate {
    /// Generate the prompt text.
    fn generate(&self) -> String;

    /// Get the system prompt (if any).
    fn system_prompt(&self) -> Option<String> {
        None
    }
}

const SYSTEM_PROMPT: &str = r#"You are an AI agent on a collaborative canvas called EmojiPlace. Your goal is to work with other AI agents to create a coherent and interesting scene.
You have a long-term plan and a short-term memory (scratchpad).
You can communicate with other agents by sending messages.
You can see a portion of the canvas around your area of interest.
Based on your state and the canvas, decide on one single action to take this turn.

Respond ONLY with a JSON object of this shape:
{
  "thought": "Your reasoning for this turn.",
  "messages": [{ "to": "agent-id", "content": "Your message." }],
  "placePixel": { "x": <integer>, "y": <integer>, "emoji": "<single emoji>" }
}

Rules:
- Place at most one pixel per turn.
- "emoji" must be a single Unicode emoji.
- Send zero or more messages.
- Use null for "placePixel" to do nothing."#;

/// Prompt asking one agent for its next action.
#[derive(Debug, Clone)]
pub struct DecisionPrompt<'a> {
    pub request: &'a DecisionRequest,
    /// Agent ids the agent may address.
    pub peers: Vec<String>,
}

impl<'a> DecisionPrompt<'a> {
    pub fn new(request: &'a DecisionRequest) -> Self {
        Self {
            request,
            peers: Vec::new(),
        }
    }

    pub fn with_peers(mut self, peers: Vec<String>) -> Self {
        self.peers = peers;
        self
    }
}

impl PromptTemplate for DecisionPrompt<'_> {
    fn system_prompt(&self) -> Option<String> {
        Some(SYSTEM_PROMPT.to_string())
    }

    fn generate(&self) -> String {
        let r = self.request;
        let inbox = serde_json::to_string_pretty(&r.inbox).unwrap_or_else(|_| "[]".into());
        let pixels =
            serde_json::to_string_pretty(&r.observed_pixels).unwrap_or_else(|_| "[]".into());
        let peers = if self.peers.is_empty() {
            String::new()
        } else {
            format!("- Other agents: {}\n", self.peers.join(", "))
        };

        format!(
            r#"Current state for agent {}:
- Long-term plan: {}
- Short-term memory (scratchpad): {}
{}- Incoming messages: {}

Current canvas data (in your area of interest):
{}

Review your plan, memory, messages and the canvas, then respond with your next action as JSON."#,
            r.agent_id, r.plan, r.scratchpad, peers, inbox, pixels
        )
    }
}

/// Parse a model response into a decision.
///
/// Models often wrap the JSON in a Markdown fence or add prose around it;
/// the outermost `{...}` is taken.
pub fn parse_decision(response: &str) -> LlmResult<AgentDecision> {
    let json = extract_json_object(response);
    serde_json::from_str(json).map_err(|e| {
        LlmError::ParseError(format!("Failed to parse decision: {}. Response: {}", e, response))
    })
}

fn extract_json_object(text: &str) -> &str {
    let text = text.trim();
    let text = match text.find("```") {
        Some(start) => {
            let fenced = &text[start + 3..];
            let fenced = fenced.strip_prefix("json").unwrap_or(fenced);
            match fenced.find("```") {
                Some(end) => &fenced[..end],
                None => fenced,
            }
        }
        None => text,
    };

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text.trim(),
    }
}
