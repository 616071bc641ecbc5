//! Convenience re-exports.

pub use crate::memory::{AgentMemory, AgentMemoryStore, InboxSnapshot, MessageLog};
pub use crate::orchestrator::{
    AgentError, AgentOrchestrator, AgentOutcome, AgentTurn, OrchestratorConfig, RunReport,
};
pub use crate::profile::{default_roster, AgentProfile};
