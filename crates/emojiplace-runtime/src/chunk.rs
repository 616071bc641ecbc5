//! Spatial chunk cache.
//!
//! The canvas is cut into `chunk_size × chunk_size` tiles. Each tile's pixels
//! are cached as one JSON value in the shared key-value store so a viewport
//! loads with a handful of reads. The cache is derived state: a missing or
//! unreadable tile is rebuilt from the durable pixel store, and every entry
//! expires at most one ttl after it was last rebuilt from that store.
//!
//! Concurrent writers to the same tile would lose each other's updates with a
//! plain read-modify-write, so [`ChunkCache::apply_pixel`] only runs under a
//! lease on the tile. A writer that cannot get the lease skips the update;
//! the next leased write or the entry's expiry brings the tile back in line.

use crate::lease::LeaseManager;
use emojiplace_core::types::{ChunkId, Coord, Pixel};
use emojiplace_store::{KvStore, PixelStore, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Cache key of a tile.
pub fn chunk_key(id: ChunkId) -> String {
    format!("pixels:chunk:{}:{}", id.cx, id.cy)
}

/// The pixels of one tile, keyed by coordinate.
///
/// Stored as a JSON array of pixels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Pixel>", into = "Vec<Pixel>")]
pub struct Chunk {
    pixels: BTreeMap<Coord, Pixel>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, coord: Coord) -> Option<&Pixel> {
        self.pixels.get(&coord)
    }

    /// Insert or replace the pixel at its coordinate.
    pub fn upsert(&mut self, pixel: Pixel) {
        self.pixels.insert(pixel.coord(), pixel);
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> impl Iterator<Item = &Pixel> {
        self.pixels.values()
    }

    pub fn into_pixels(self) -> Vec<Pixel> {
        self.pixels.into_values().collect()
    }

    /// Coordinate → pixel map with `"x,y"` keys, as served to clients.
    pub fn to_coord_map(&self) -> BTreeMap<String, Pixel> {
        self.pixels
            .iter()
            .map(|(coord, pixel)| (coord.to_string(), pixel.clone()))
            .collect()
    }
}

impl From<Vec<Pixel>> for Chunk {
    fn from(pixels: Vec<Pixel>) -> Self {
        let mut chunk = Chunk::new();
        for pixel in pixels {
            chunk.upsert(pixel);
        }
        chunk
    }
}

impl From<Chunk> for Vec<Pixel> {
    fn from(chunk: Chunk) -> Self {
        chunk.into_pixels()
    }
}

/// Why a cache update was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Another writer holds the tile's lease.
    LeaseHeld,
    /// The cache (or the durable store during a rebuild) failed.
    CacheUnavailable(String),
}

/// Outcome of [`ChunkCache::apply_pixel`]. Never an error: the cache is
/// allowed to miss updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkUpdate {
    Applied,
    Skipped(SkipReason),
}

impl ChunkUpdate {
    pub fn is_applied(&self) -> bool {
        matches!(self, ChunkUpdate::Applied)
    }
}

/// Tile cache over the shared key-value store, rebuilt from the durable
/// pixel store on demand.
pub struct ChunkCache {
    kv: Arc<dyn KvStore>,
    pixels: Arc<dyn PixelStore>,
    leases: LeaseManager,
    chunk_size: i64,
    ttl: Duration,
}

impl ChunkCache {
    pub fn new(
        kv: Arc<dyn KvStore>,
        pixels: Arc<dyn PixelStore>,
        leases: LeaseManager,
        chunk_size: i64,
        ttl: Duration,
    ) -> Self {
        Self {
            kv,
            pixels,
            leases,
            chunk_size: chunk_size.max(1),
            ttl,
        }
    }

    pub fn chunk_size(&self) -> i64 {
        self.chunk_size
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The tile covering `coord`.
    pub fn chunk_of(&self, coord: Coord) -> ChunkId {
        coord.chunk(self.chunk_size)
    }

    /// Build a tile from scratch out of the durable store. Never touches the
    /// cache.
    ///
    /// Tiles at the very ends of the `i64` range hold no pixels, since
    /// placements there are rejected.
    pub async fn rebuild(&self, id: ChunkId) -> StoreResult<Chunk> {
        let (min, max) = match id.bounds(self.chunk_size) {
            Some(bounds) => bounds,
            None => return Ok(Chunk::new()),
        };
        let pixels = self.pixels.scan(min, max).await?;
        debug!("Rebuilt chunk {} with {} pixels", id, pixels.len());
        Ok(Chunk::from(pixels))
    }

    /// Read a tile, rebuilding and caching it on a miss.
    ///
    /// Falls back to the durable store when the cache is unreachable; only a
    /// durable-store failure is returned as an error.
    pub async fn read_chunk(&self, id: ChunkId) -> StoreResult<Chunk> {
        let key = chunk_key(id);

        match self.kv.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Chunk>(&raw) {
                Ok(chunk) => return Ok(chunk),
                Err(e) => warn!("Discarding unreadable cached chunk {}: {}", id, e),
            },
            Ok(None) => {}
            Err(e) => {
                warn!("Chunk cache unavailable, reading {} from durable store: {}", id, e);
                return self.rebuild(id).await;
            }
        }

        let chunk = self.rebuild(id).await?;

        // Never overwrite an entry a leased writer put there in the meantime.
        let stored = match serde_json::to_string(&chunk) {
            Ok(json) => self.kv.set_if_absent(&key, &json, self.ttl).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = stored {
            warn!("Failed to cache chunk {}: {}", id, e);
        }

        Ok(chunk)
    }

    /// Fold a freshly persisted pixel into its cached tile.
    ///
    /// Runs only while holding the tile's lease. A held lease or a cache
    /// failure skips the update without retrying.
    pub async fn apply_pixel(&self, pixel: &Pixel) -> ChunkUpdate {
        let id = self.chunk_of(pixel.coord());

        let lease = match self.leases.try_acquire(&format!("chunk:{}", id)).await {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                debug!("Skipping cache update for chunk {}: lease held", id);
                return ChunkUpdate::Skipped(SkipReason::LeaseHeld);
            }
            Err(e) => {
                warn!("Skipping cache update for chunk {}: {}", id, e);
                return ChunkUpdate::Skipped(SkipReason::CacheUnavailable(e.to_string()));
            }
        };

        let result = self.read_modify_write(id, pixel).await;

        if let Err(e) = self.leases.release(lease).await {
            warn!("Failed to release lease for chunk {}: {}", id, e);
        }

        match result {
            Ok(()) => ChunkUpdate::Applied,
            Err(e) => {
                warn!("Cache update for chunk {} failed: {}", id, e);
                ChunkUpdate::Skipped(SkipReason::CacheUnavailable(e.to_string()))
            }
        }
    }

    async fn read_modify_write(&self, id: ChunkId, pixel: &Pixel) -> StoreResult<()> {
        let key = chunk_key(id);
        let raw = self.kv.get(&key).await?;
        let remaining = self.kv.ttl(&key).await?;

        // An updated entry keeps its original expiry, so no cached pixel
        // outlives the ttl measured from the rebuild that produced it.
        let cached = match (raw, remaining) {
            (Some(raw), Some(remaining)) if !remaining.is_zero() => {
                serde_json::from_str::<Chunk>(&raw).ok().map(|c| (c, remaining))
            }
            _ => None,
        };

        let (mut chunk, ttl) = match cached {
            Some(found) => found,
            None => (self.rebuild(id).await?, self.ttl),
        };

        chunk.upsert(pixel.clone());
        let json = serde_json::to_string(&chunk)?;
        self.kv.set(&key, &json, Some(ttl)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emojiplace_core::clock::ManualClock;
    use emojiplace_store::{MemoryKv, MemoryPixelStore};

    struct Fixture {
        clock: Arc<ManualClock>,
        kv: Arc<MemoryKv>,
        pixels: Arc<MemoryPixelStore>,
        leases: LeaseManager,
        cache: ChunkCache,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(0));
        let kv = Arc::new(MemoryKv::new(clock.clone()));
        let pixels = Arc::new(MemoryPixelStore::new());
        let leases = LeaseManager::new(kv.clone(), Duration::from_secs(5));
        let cache = ChunkCache::new(
            kv.clone(),
            pixels.clone(),
            leases.clone(),
            10,
            Duration::from_secs(60),
        );
        Fixture {
            clock,
            kv,
            pixels,
            leases,
            cache,
        }
    }

    fn pixel(x: i64, y: i64, mark: &str) -> Pixel {
        Pixel {
            x,
            y,
            mark: mark.into(),
            placed_by: "u".into(),
            display_name: None,
            written_at: 0,
        }
    }

    /// Write durably, then update the cache, the way placements do.
    async fn place(f: &Fixture, p: Pixel) -> ChunkUpdate {
        f.pixels.put(&p).await.unwrap();
        f.cache.apply_pixel(&p).await
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let f = fixture();
        assert!(place(&f, pixel(3, 4, "🙂")).await.is_applied());

        let chunk = f.cache.read_chunk(ChunkId::new(0, 0)).await.unwrap();
        assert_eq!(chunk.get(Coord::new(3, 4)).unwrap().mark, "🙂");
        assert_eq!(chunk.len(), 1);
    }

    #[tokio::test]
    async fn test_read_miss_rebuilds_and_caches() {
        let f = fixture();
        f.pixels.put(&pixel(-1, -1, "🌑")).await.unwrap();
        f.pixels.put(&pixel(0, 0, "🌕")).await.unwrap();

        let chunk = f.cache.read_chunk(ChunkId::new(-1, -1)).await.unwrap();
        assert_eq!(chunk.len(), 1);
        assert!(f.kv.get(&chunk_key(ChunkId::new(-1, -1))).await.unwrap().is_some());
        assert_eq!(
            f.kv.ttl(&chunk_key(ChunkId::new(-1, -1))).await.unwrap(),
            Some(Duration::from_secs(60))
        );
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let f = fixture();
        for (x, y) in [(1, 1), (2, 9), (9, 2)] {
            f.pixels.put(&pixel(x, y, "⭐")).await.unwrap();
        }
        let first = f.cache.rebuild(ChunkId::new(0, 0)).await.unwrap();
        let second = f.cache.rebuild(ChunkId::new(0, 0)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[tokio::test]
    async fn test_update_skipped_while_lease_held() {
        let f = fixture();
        let _other_writer = f.leases.try_acquire("chunk:0:0").await.unwrap().unwrap();

        let update = place(&f, pixel(1, 1, "🙂")).await;
        assert_eq!(update, ChunkUpdate::Skipped(SkipReason::LeaseHeld));
        assert!(f.kv.get(&chunk_key(ChunkId::new(0, 0))).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_next_writer_converges_after_skip() {
        let f = fixture();
        // Cache the tile, then let one update be skipped.
        place(&f, pixel(1, 1, "🅰")).await;
        let held = f.leases.try_acquire("chunk:0:0").await.unwrap().unwrap();
        place(&f, pixel(2, 2, "🅱")).await;
        f.leases.release(held).await.unwrap();

        // The skipped pixel is missing until the entry expires.
        let chunk = f.cache.read_chunk(ChunkId::new(0, 0)).await.unwrap();
        assert!(chunk.get(Coord::new(2, 2)).is_none());

        f.clock.advance(Duration::from_secs(60));
        let chunk = f.cache.read_chunk(ChunkId::new(0, 0)).await.unwrap();
        assert_eq!(chunk.get(Coord::new(2, 2)).unwrap().mark, "🅱");
    }

    #[tokio::test]
    async fn test_update_keeps_original_expiry() {
        let f = fixture();
        place(&f, pixel(1, 1, "🙂")).await;
        f.clock.advance(Duration::from_secs(40));
        place(&f, pixel(2, 2, "🙃")).await;

        let key = chunk_key(ChunkId::new(0, 0));
        assert_eq!(f.kv.ttl(&key).await.unwrap(), Some(Duration::from_secs(20)));
    }

    #[tokio::test]
    async fn test_lease_released_after_update() {
        let f = fixture();
        place(&f, pixel(1, 1, "🙂")).await;
        assert!(f.leases.try_acquire("chunk:0:0").await.unwrap().is_some());
    }

    #[test]
    fn test_chunk_json_is_pixel_array() {
        let chunk = Chunk::from(vec![pixel(2, 1, "b"), pixel(1, 1, "a")]);
        let json: serde_json::Value = serde_json::to_value(&chunk).unwrap();
        assert!(json.is_array());
        assert_eq!(json.as_array().unwrap().len(), 2);

        let map = chunk.to_coord_map();
        assert_eq!(map["1,1"].mark, "a");
        assert_eq!(map["2,1"].mark, "b");
    }
}
