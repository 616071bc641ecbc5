//! Convenience re-exports.

pub use crate::broadcast::{BroadcastReport, Broadcaster, DeliveryError, Transport};
pub use crate::chunk::{chunk_key, Chunk, ChunkCache, ChunkUpdate, SkipReason};
pub use crate::cooldown::{CooldownLedger, CooldownStatus};
pub use crate::lease::{Lease, LeaseManager};
pub use crate::pipeline::{PlaceRequest, Placement, PlacementPipeline, MAX_REGION_SIDE};
pub use crate::registry::ConnectionRegistry;
pub use crate::users::UserDirectory;
