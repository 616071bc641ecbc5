//! The placement pipeline.
//!
//! A placement goes through these steps in order:
//!
//! 1. validate the mark (and display name, if given)
//! 2. check the identity's cooldown
//! 3. upsert the pixel into the durable store
//! 4. fold it into the cached chunk under a lease (may be skipped)
//! 5. broadcast `pixel_placed`
//! 6. start the identity's next cooldown
//!
//! Only steps 1-3 can fail the call. Once the pixel is durable the placement
//! counts as accepted whatever happens to the cache, the broadcast or the
//! cooldown write.

use crate::broadcast::{Broadcaster, Transport};
use crate::chunk::{Chunk, ChunkCache, ChunkUpdate};
use crate::cooldown::{CooldownLedger, CooldownStatus};
use crate::lease::LeaseManager;
use crate::registry::ConnectionRegistry;
use crate::users::UserDirectory;
use emojiplace_core::clock::Clock;
use emojiplace_core::config::CanvasConfig;
use emojiplace_core::error::{PlaceError, PlaceResult};
use emojiplace_core::event::CanvasEvent;
use emojiplace_core::types::{
    validate_coord, validate_display_name, validate_mark, ChunkId, Coord, Pixel,
};
use emojiplace_store::{KvStore, PixelStore, StoreError};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Widest and tallest rectangle a single region read may cover.
pub const MAX_REGION_SIDE: i64 = 1000;

/// A request to write one mark.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceRequest {
    #[serde(default)]
    pub identity: String,
    pub x: i64,
    pub y: i64,
    #[serde(alias = "emoji")]
    pub mark: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl PlaceRequest {
    pub fn new(identity: impl Into<String>, x: i64, y: i64, mark: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            x,
            y,
            mark: mark.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// An accepted placement.
#[derive(Debug, Clone)]
pub struct Placement {
    pub pixel: Pixel,
    /// The cooldown the placer now has to wait out.
    pub cooldown: CooldownStatus,
    /// Whether the cached chunk picked up the pixel.
    pub chunk_update: ChunkUpdate,
}

fn unavailable(e: StoreError) -> PlaceError {
    PlaceError::StoreUnavailable(e.to_string())
}

/// Accepts, persists and announces placements.
///
/// Holds no state of its own; everything lives in the shared stores, so any
/// number of pipelines over the same stores behave as one.
pub struct PlacementPipeline {
    pixels: Arc<dyn PixelStore>,
    cooldowns: CooldownLedger,
    cache: ChunkCache,
    broadcaster: Broadcaster,
    users: UserDirectory,
    clock: Arc<dyn Clock>,
}

impl PlacementPipeline {
    pub fn new(
        config: &CanvasConfig,
        kv: Arc<dyn KvStore>,
        pixels: Arc<dyn PixelStore>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let leases = LeaseManager::new(kv.clone(), config.lease_ttl());
        let cache = ChunkCache::new(
            kv.clone(),
            pixels.clone(),
            leases,
            config.chunk_size,
            config.chunk_ttl(),
        );
        let broadcaster = Broadcaster::new(ConnectionRegistry::new(kv.clone()), transport);

        Self {
            pixels,
            cooldowns: CooldownLedger::new(kv.clone(), clock.clone(), config.cooldown()),
            cache,
            broadcaster,
            users: UserDirectory::new(kv),
            clock,
        }
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        self.broadcaster.registry()
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Place a mark on behalf of `request.identity`.
    pub async fn place(&self, request: PlaceRequest) -> PlaceResult<Placement> {
        validate_coord(Coord::new(request.x, request.y), self.cache.chunk_size())?;
        validate_mark(&request.mark)?;
        let explicit_name = match request.display_name.as_deref() {
            Some(name) => Some(validate_display_name(name)?),
            None => None,
        };

        let status = self
            .cooldowns
            .check(&request.identity)
            .await
            .map_err(unavailable)?;
        if !status.eligible {
            debug!(
                "Rejected placement by {}: {}s of cooldown left",
                request.identity,
                status.remaining_secs()
            );
            return Err(PlaceError::CooldownActive {
                remaining: status.remaining,
            });
        }

        let display_name = match explicit_name {
            Some(name) => Some(name),
            None => self.registered_name(&request.identity).await,
        };

        let pixel = Pixel {
            x: request.x,
            y: request.y,
            mark: request.mark,
            placed_by: request.identity,
            display_name,
            written_at: self.clock.now_millis(),
        };

        self.pixels.put(&pixel).await.map_err(|e| {
            warn!("Durable write failed for {}: {}", pixel.coord(), e);
            unavailable(e)
        })?;

        let chunk_update = self.cache.apply_pixel(&pixel).await;

        self.broadcaster
            .broadcast(&CanvasEvent::PixelPlaced(pixel.clone()))
            .await;

        if let Err(e) = self.cooldowns.mark_used(&pixel.placed_by).await {
            warn!("Failed to start cooldown for {}: {}", pixel.placed_by, e);
        }

        info!(
            "{} placed {} at {}",
            pixel.placed_by,
            pixel.mark,
            pixel.coord()
        );

        Ok(Placement {
            pixel,
            cooldown: CooldownStatus::waiting(self.cooldowns.duration()),
            chunk_update,
        })
    }

    /// Current cooldown of an identity.
    pub async fn cooldown(&self, identity: &str) -> PlaceResult<CooldownStatus> {
        self.cooldowns.check(identity).await.map_err(unavailable)
    }

    /// Cached contents of one tile.
    pub async fn read_chunk(&self, cx: i64, cy: i64) -> PlaceResult<Chunk> {
        let id = ChunkId::new(cx, cy);
        if id.bounds(self.cache.chunk_size()).is_none() {
            return Err(PlaceError::Validation(format!("tile {} is outside the canvas", id)));
        }
        self.cache
            .read_chunk(id)
            .await
            .map_err(unavailable)
    }

    /// The authoritative pixel at a coordinate.
    pub async fn get_pixel(&self, x: i64, y: i64) -> PlaceResult<Option<Pixel>> {
        self.pixels.get(Coord::new(x, y)).await.map_err(unavailable)
    }

    /// Every pixel in the `width` x `height` rectangle whose top-left corner
    /// is `(x, y)`, read from the durable store.
    pub async fn get_region(&self, x: i64, y: i64, width: i64, height: i64) -> PlaceResult<Vec<Pixel>> {
        if !(1..=MAX_REGION_SIDE).contains(&width) || !(1..=MAX_REGION_SIDE).contains(&height) {
            return Err(PlaceError::Validation(format!(
                "region sides must be 1-{}",
                MAX_REGION_SIDE
            )));
        }
        let min = Coord::new(x, y);
        let max = match (x.checked_add(width), y.checked_add(height)) {
            (Some(max_x), Some(max_y)) => Coord::new(max_x, max_y),
            _ => {
                return Err(PlaceError::Validation(
                    "region extends past the canvas".to_string(),
                ))
            }
        };
        self.pixels.scan(min, max).await.map_err(unavailable)
    }

    /// Register a display name used by later placements of `identity`.
    pub async fn set_display_name(&self, identity: &str, name: &str) -> PlaceResult<String> {
        self.users.set_display_name(identity, name).await
    }

    async fn registered_name(&self, identity: &str) -> Option<String> {
        match self.users.display_name(identity).await {
            Ok(name) => name,
            Err(e) => {
                warn!("Could not look up display name for {}: {}", identity, e);
                None
            }
        }
    }
}
