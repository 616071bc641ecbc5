//! Convenience re-exports.

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::CanvasConfig;
pub use crate::error::{PlaceError, PlaceResult};
pub use crate::event::CanvasEvent;
pub use crate::types::{
    validate_coord, validate_display_name, validate_mark, AgentMessage, ChunkId, Coord, Pixel, Timestamp,
};
