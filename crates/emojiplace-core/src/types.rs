//! Shared types used across all EmojiPlace crates.

use crate::error::PlaceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Longest display name an identity may register, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 20;

/// A cell on the unbounded canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i64,
    pub y: i64,
}

impl Coord {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// The tile containing this coordinate. Floors toward negative infinity,
    /// so `(-1, -1)` lives in tile `(-1, -1)`, not `(0, 0)`.
    pub fn chunk(&self, chunk_size: i64) -> ChunkId {
        ChunkId::new(self.x.div_euclid(chunk_size), self.y.div_euclid(chunk_size))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Identifier of a fixed-size spatial tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkId {
    pub cx: i64,
    pub cy: i64,
}

impl ChunkId {
    pub fn new(cx: i64, cy: i64) -> Self {
        Self { cx, cy }
    }

    /// Half-open coordinate range `(min, max)` covered by this tile, or
    /// `None` when either end does not fit in an `i64`.
    pub fn bounds(&self, chunk_size: i64) -> Option<(Coord, Coord)> {
        let min_x = self.cx.checked_mul(chunk_size)?;
        let min_y = self.cy.checked_mul(chunk_size)?;
        let max = Coord::new(min_x.checked_add(chunk_size)?, min_y.checked_add(chunk_size)?);
        Some((Coord::new(min_x, min_y), max))
    }

    /// Whether `coord` falls inside this tile.
    pub fn contains(&self, coord: Coord, chunk_size: i64) -> bool {
        coord.chunk(chunk_size) == *self
    }

    /// This tile plus every tile within `radius` rings around it. Tiles
    /// whose ids would overflow are left out.
    pub fn neighborhood(&self, radius: i64) -> Vec<ChunkId> {
        let mut ids = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if let (Some(cx), Some(cy)) = (self.cx.checked_add(dx), self.cy.checked_add(dy)) {
                    ids.push(ChunkId::new(cx, cy));
                }
            }
        }
        ids
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.cx, self.cy)
    }
}

/// The latest mark written at a coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pixel {
    pub x: i64,
    pub y: i64,
    pub mark: String,
    pub placed_by: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub written_at: Timestamp,
}

impl Pixel {
    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }
}

/// A message one agent sent to another. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    pub id: String,
    pub sent_at: Timestamp,
    pub from: String,
    pub to: String,
    pub content: String,
}

impl AgentMessage {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        content: impl Into<String>,
        sent_at: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sent_at,
            from: from.into(),
            to: to.into(),
            content: content.into(),
        }
    }
}

/// Check that `mark` is exactly one renderable symbol.
///
/// A symbol is one extended grapheme cluster, so flags, skin-tone modifiers
/// and ZWJ sequences count as one. Whitespace and control characters are
/// rejected.
pub fn validate_mark(mark: &str) -> Result<(), PlaceError> {
    let mut graphemes = mark.graphemes(true);
    let first = graphemes
        .next()
        .ok_or_else(|| PlaceError::Validation("mark is empty".to_string()))?;

    if graphemes.next().is_some() {
        return Err(PlaceError::Validation(format!(
            "mark must be a single symbol, got {:?}",
            mark
        )));
    }

    if first.chars().all(char::is_whitespace) {
        return Err(PlaceError::Validation("mark is whitespace".to_string()));
    }

    if first.chars().any(char::is_control) {
        return Err(PlaceError::Validation(
            "mark contains control characters".to_string(),
        ));
    }

    Ok(())
}

/// Check that `coord` lies in a tile whose bounds fit in an `i64`.
///
/// The outermost partial tiles at either end of the `i64` range are not
/// part of the canvas.
pub fn validate_coord(coord: Coord, chunk_size: i64) -> Result<(), PlaceError> {
    match coord.chunk(chunk_size).bounds(chunk_size) {
        Some(_) => Ok(()),
        None => Err(PlaceError::Validation(format!(
            "coordinate {} is outside the canvas",
            coord
        ))),
    }
}

/// Trim a display name and check its length. Returns the trimmed name.
pub fn validate_display_name(name: &str) -> Result<String, PlaceError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > MAX_DISPLAY_NAME_CHARS {
        return Err(PlaceError::Validation(format!(
            "display name must be 1-{} characters",
            MAX_DISPLAY_NAME_CHARS
        )));
    }
    Ok(trimmed.to_string())
}
