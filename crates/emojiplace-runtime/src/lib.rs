//! # EmojiPlace Runtime
//!
//! Everything between a placement request and the observers who see it.
//!
//! The placement pipeline is the entry point; the pieces it composes are
//! usable on their own:
//!
//! - [`cooldown`]: per-identity rate limit with self-expiring records
//! - [`lease`]: expiring mutual exclusion over the shared key-value store
//! - [`chunk`]: the spatial tile cache and its lease-guarded updates
//! - [`registry`] / [`broadcast`]: live connections and best-effort fan-out
//! - [`users`]: display names
//! - [`pipeline`]: validate, check cooldown, persist, cache, broadcast
//!
//! Nothing here holds process-local state. Two pipelines built over the same
//! stores are interchangeable.

pub mod broadcast;
pub mod chunk;
pub mod cooldown;
pub mod lease;
pub mod pipeline;
pub mod prelude;
pub mod registry;
pub mod users;
