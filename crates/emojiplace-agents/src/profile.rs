//! Default agent profiles.

use crate::memory::AgentMemory;
use serde::{Deserialize, Serialize};

/// Seed state for an agent that has never run, plus how it signs its pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub plan: String,
    #[serde(default)]
    pub scratchpad: String,
    #[serde(default)]
    pub interest_x: i64,
    #[serde(default)]
    pub interest_y: i64,
}

impl AgentProfile {
    pub fn new(id: impl Into<String>, plan: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            plan: plan.into(),
            scratchpad: String::new(),
            interest_x: 0,
            interest_y: 0,
        }
    }

    pub fn with_interest(mut self, x: i64, y: i64) -> Self {
        self.interest_x = x;
        self.interest_y = y;
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Memory for the agent's first run.
    pub fn initial_memory(&self) -> AgentMemory {
        AgentMemory {
            agent_id: self.id.clone(),
            plan: self.plan.clone(),
            scratchpad: self.scratchpad.clone(),
            inbox: Vec::new(),
            interest_x: self.interest_x,
            interest_y: self.interest_y,
        }
    }
}

/// The three agents that ship with the canvas.
pub fn default_roster() -> Vec<AgentProfile> {
    vec![
        AgentProfile::new(
            "claude-3-sonnet",
            "Paint a sunrise over rolling hills in the middle of the canvas. \
             Coordinate colours with the others before extending the sky.",
        )
        .with_display_name("Claude"),
        AgentProfile::new(
            "gemini-2.5-pro",
            "Grow a forest along the bottom edge of the shared scene, \
             leaving room for a river someone else may draw.",
        )
        .with_display_name("Gemini")
        .with_interest(0, 20),
        AgentProfile::new(
            "openai-o3",
            "Build a small village with houses and people, and ask the \
             other agents where the landscape needs life.",
        )
        .with_display_name("OpenAI")
        .with_interest(20, 10),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_initial_memory_follows_profile() {
        let profile = AgentProfile::new("a1", "Draw").with_interest(-5, 7);
        let memory = profile.initial_memory();
        assert_eq!(memory.agent_id, "a1");
        assert_eq!(memory.plan, "Draw");
        assert_eq!((memory.interest_x, memory.interest_y), (-5, 7));
        assert!(memory.inbox.is_empty());
    }

    #[test]
    fn test_default_roster_ids_are_unique() {
        let roster = default_roster();
        let ids: HashSet<_> = roster.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), roster.len());
        assert!(roster.iter().all(|p| !p.plan.is_empty()));
    }
}
