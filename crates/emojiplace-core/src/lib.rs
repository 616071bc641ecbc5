//! # EmojiPlace Core
//!
//! Shared types for the EmojiPlace canvas: an unbounded grid of single-mark
//! pixels written concurrently by people and autonomous agents.
//!
//! - [`types`]: pixels, coordinates, chunk ids, agent messages
//! - [`event`]: events fanned out to live observers
//! - [`error`]: the errors a placement can surface to its caller
//! - [`clock`]: the time seam every time-dependent component reads through
//! - [`config`]: canvas-wide constants
//!
//! ## Quick Start
//!
//! ```rust
//! use emojiplace_core::prelude::*;
//!
//! let coord = Coord::new(-1, 250);
//! assert_eq!(coord.chunk(100), ChunkId::new(-1, 2));
//! assert!(validate_mark("🙂").is_ok());
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod prelude;
pub mod types;
