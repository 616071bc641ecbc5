//! SQLite-backed durable pixel store.
//!
//! One row per coordinate, upserted on every write. Blocking SQLite calls run
//! on tokio's blocking pool so request handlers never stall the executor.

#![cfg(feature = "sqlite")]

use crate::{PixelStore, StoreError, StoreResult};
use async_trait::async_trait;
use emojiplace_core::types::{Coord, Pixel};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// SQLite implementation of [`PixelStore`].
///
/// Supports both in-memory and file-backed databases.
#[derive(Clone)]
pub struct SqlitePixelStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePixelStore {
    /// Create a new in-memory SQLite store.
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_with_connection(conn)
    }

    /// Create or open a file-backed SQLite store.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        debug!("Opening pixel database {}", path.as_ref().display());
        let conn = Connection::open(path)?;
        Self::init_with_connection(conn)
    }

    fn init_with_connection(conn: Connection) -> StoreResult<Self> {
        // WAL lets range reads proceed while a write is in flight
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pixels (
                x INTEGER NOT NULL,
                y INTEGER NOT NULL,
                mark TEXT NOT NULL,
                placed_by TEXT NOT NULL,
                display_name TEXT,
                written_at INTEGER NOT NULL,
                PRIMARY KEY (x, y)
            );

            CREATE INDEX IF NOT EXISTS idx_pixels_yx ON pixels(y, x);
            "#,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("Failed to acquire lock: {}", e)))?;
            f(&conn)
        })
        .await
        .map_err(|e| {
            error!("SQLite task failed: {}", e);
            StoreError::Unavailable(format!("Blocking task failed: {}", e))
        })?
    }
}

fn row_to_pixel(row: &rusqlite::Row<'_>) -> rusqlite::Result<Pixel> {
    Ok(Pixel {
        x: row.get(0)?,
        y: row.get(1)?,
        mark: row.get(2)?,
        placed_by: row.get(3)?,
        display_name: row.get(4)?,
        written_at: row.get::<_, i64>(5)? as u64,
    })
}

#[async_trait]
impl PixelStore for SqlitePixelStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn put(&self, pixel: &Pixel) -> StoreResult<()> {
        let pixel = pixel.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO pixels (x, y, mark, placed_by, display_name, written_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(x, y) DO UPDATE SET
                    mark = excluded.mark,
                    placed_by = excluded.placed_by,
                    display_name = excluded.display_name,
                    written_at = excluded.written_at",
                params![
                    pixel.x,
                    pixel.y,
                    pixel.mark,
                    pixel.placed_by,
                    pixel.display_name,
                    pixel.written_at as i64
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, coord: Coord) -> StoreResult<Option<Pixel>> {
        self.with_conn(move |conn| {
            let pixel = conn
                .query_row(
                    "SELECT x, y, mark, placed_by, display_name, written_at
                     FROM pixels WHERE x = ?1 AND y = ?2",
                    params![coord.x, coord.y],
                    row_to_pixel,
                )
                .optional()?;
            Ok(pixel)
        })
        .await
    }

    async fn scan(&self, min: Coord, max: Coord) -> StoreResult<Vec<Pixel>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT x, y, mark, placed_by, display_name, written_at
                 FROM pixels
                 WHERE x >= ?1 AND x < ?2 AND y >= ?3 AND y < ?4
                 ORDER BY y, x",
            )?;
            let pixels = stmt
                .query_map(params![min.x, max.x, min.y, max.y], row_to_pixel)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(pixels)
        })
        .await
    }

    async fn count(&self) -> StoreResult<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM pixels", [], |row| row.get(0))?;
            Ok(n as usize)
        })
        .await
    }
}
