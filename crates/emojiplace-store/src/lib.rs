//! # EmojiPlace Store
//!
//! Storage seams for the EmojiPlace canvas.
//!
//! Two traits separate the two tiers of state:
//!
//! | Trait | Role | Backends |
//! |-------|------|----------|
//! | [`KvStore`] | Shared key-value service: cooldowns, leases, chunk cache, connection set, agent memory | [`MemoryKv`] |
//! | [`PixelStore`] | Durable, authoritative record of the latest pixel per coordinate | [`MemoryPixelStore`], `SqlitePixelStore` (`sqlite` feature) |
//!
//! Every execution unit talks to the same store instances, so no state lives
//! in process-local globals.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use emojiplace_core::prelude::*;
//! use emojiplace_store::{KvStore, MemoryKv};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let kv = MemoryKv::new(Arc::new(SystemClock));
//! assert!(kv.set_if_absent("lease:chunk:0:0", "me", Duration::from_secs(5)).await?);
//! assert!(!kv.set_if_absent("lease:chunk:0:0", "you", Duration::from_secs(5)).await?);
//! ```

pub mod memory;
pub mod pixels;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use emojiplace_core::types::{Coord, Pixel};
use std::time::Duration;
use thiserror::Error;

pub use memory::MemoryKv;
pub use pixels::MemoryPixelStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqlitePixelStore;

/// Errors raised by storage backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Wrong value type at key {0}")]
    WrongType(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A shared key-value service with expiring keys, sets and lists.
///
/// Values are strings (usually JSON). Expired keys are invisible to every
/// operation. Each method is atomic with respect to the key it touches.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Read a string value.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a string value, replacing whatever was there. `ttl = None`
    /// means the key never expires.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Write only if the key is absent (or expired). Returns whether the
    /// write happened. The expiry is mandatory.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// Remove a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Remove a key only if it currently holds `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool>;

    /// Remaining lifetime of a key, `None` if absent or persistent.
    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Add a member to a set. Returns whether it was newly added.
    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Remove a member from a set. Returns whether it was present.
    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// All members of a set.
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Append to a list. Returns the new length.
    async fn list_push(&self, key: &str, value: &str) -> StoreResult<usize>;

    /// Every element of a list, oldest first.
    async fn list_range(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Drop up to `count` elements from the front. Returns how many went.
    async fn list_drop_front(&self, key: &str, count: usize) -> StoreResult<usize>;

    /// Keep only the newest `keep` elements. Returns how many were dropped.
    async fn list_retain_last(&self, key: &str, keep: usize) -> StoreResult<usize>;

    /// Keys starting with `prefix`, in sorted order.
    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

/// The durable, authoritative pixel record.
///
/// One pixel per coordinate; a put at an occupied coordinate replaces the old
/// value (last write wins).
#[async_trait]
pub trait PixelStore: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Insert or replace the pixel at its coordinate.
    async fn put(&self, pixel: &Pixel) -> StoreResult<()>;

    /// The pixel at a coordinate, if any.
    async fn get(&self, coord: Coord) -> StoreResult<Option<Pixel>>;

    /// Every pixel with `min.x <= x < max.x` and `min.y <= y < max.y`.
    async fn scan(&self, min: Coord, max: Coord) -> StoreResult<Vec<Pixel>>;

    /// Total number of stored pixels.
    async fn count(&self) -> StoreResult<usize>;
}
