//! # EmojiPlace Agents
//!
//! Autonomous identities that paint alongside people.
//!
//! Each agent has a plan, a scratchpad, an inbox and an interest point. On
//! every scheduled run the [`orchestrator`] shows an agent the canvas around
//! its interest point and its unread messages, asks a reasoning gateway what
//! to do, and carries the answer out through the same placement pipeline
//! people use.

pub mod memory;
pub mod orchestrator;
pub mod prelude;
pub mod profile;
