//! In-memory durable pixel backend.
//!
//! Keeps pixels in an ordered map so range scans walk rows instead of the
//! whole canvas. Useful for tests and single-process deployments.

use crate::{PixelStore, StoreError, StoreResult};
use async_trait::async_trait;
use emojiplace_core::types::{Coord, Pixel};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// In-memory [`PixelStore`].
///
/// Keyed by `(y, x)` so a scan over a rectangle is one ordered range per row.
#[derive(Default)]
pub struct MemoryPixelStore {
    pixels: RwLock<BTreeMap<(i64, i64), Pixel>>,
}

impl MemoryPixelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PixelStore for MemoryPixelStore {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn put(&self, pixel: &Pixel) -> StoreResult<()> {
        let mut pixels = self
            .pixels
            .write()
            .map_err(|e| StoreError::Unavailable(format!("Failed to acquire write lock: {}", e)))?;
        pixels.insert((pixel.y, pixel.x), pixel.clone());
        Ok(())
    }

    async fn get(&self, coord: Coord) -> StoreResult<Option<Pixel>> {
        let pixels = self
            .pixels
            .read()
            .map_err(|e| StoreError::Unavailable(format!("Failed to acquire read lock: {}", e)))?;
        Ok(pixels.get(&(coord.y, coord.x)).cloned())
    }

    async fn scan(&self, min: Coord, max: Coord) -> StoreResult<Vec<Pixel>> {
        if min.x >= max.x || min.y >= max.y {
            return Ok(Vec::new());
        }
        let pixels = self
            .pixels
            .read()
            .map_err(|e| StoreError::Unavailable(format!("Failed to acquire read lock: {}", e)))?;

        let mut found = Vec::new();
        for y in min.y..max.y {
            found.extend(
                pixels
                    .range((y, min.x)..(y, max.x))
                    .map(|(_, pixel)| pixel.clone()),
            );
        }
        Ok(found)
    }

    async fn count(&self) -> StoreResult<usize> {
        let pixels = self
            .pixels
            .read()
            .map_err(|e| StoreError::Unavailable(format!("Failed to acquire read lock: {}", e)))?;
        Ok(pixels.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(x: i64, y: i64, mark: &str) -> Pixel {
        Pixel {
            x,
            y,
            mark: mark.into(),
            placed_by: "tester".into(),
            display_name: None,
            written_at: 0,
        }
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let store = MemoryPixelStore::new();
        store.put(&pixel(1, 1, "🙂")).await.unwrap();
        store.put(&pixel(1, 1, "🙃")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        let got = store.get(Coord::new(1, 1)).await.unwrap().unwrap();
        assert_eq!(got.mark, "🙃");
        assert!(store.get(Coord::new(2, 2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scan_is_half_open() {
        let store = MemoryPixelStore::new();
        for (x, y) in [(0, 0), (9, 9), (10, 0), (0, 10), (-1, 5), (5, -1)] {
            store.put(&pixel(x, y, "x")).await.unwrap();
        }
        let mut coords: Vec<_> = store
            .scan(Coord::new(0, 0), Coord::new(10, 10))
            .await
            .unwrap()
            .iter()
            .map(Pixel::coord)
            .collect();
        coords.sort();
        assert_eq!(coords, vec![Coord::new(0, 0), Coord::new(9, 9)]);
    }

    #[tokio::test]
    async fn test_scan_negative_tile() {
        let store = MemoryPixelStore::new();
        store.put(&pixel(-3, -7, "x")).await.unwrap();
        let found = store
            .scan(Coord::new(-10, -10), Coord::new(0, 0))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(store
            .scan(Coord::new(5, 5), Coord::new(5, 10))
            .await
            .unwrap()
            .is_empty());
    }
}
