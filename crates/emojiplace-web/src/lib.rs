//! # EmojiPlace Web
//!
//! axum transport for the EmojiPlace canvas: REST endpoints, the WebSocket
//! protocol, configuration and application bootstrap. The `emojiplace`
//! binary wires these together.

pub mod config;
pub mod identity;
pub mod protocol;
pub mod routes;
pub mod state;
pub mod transport;

pub use config::Config;
pub use routes::create_router;
pub use state::AppState;
