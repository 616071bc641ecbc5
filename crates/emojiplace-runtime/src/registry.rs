//! Set of currently reachable observer connections.
//!
//! Lives in the shared key-value store, so any request handler or agent run
//! sees the same membership no matter which process accepted the socket.

use emojiplace_store::{KvStore, StoreResult};
use std::sync::Arc;
use tracing::debug;

const CONNECTIONS_KEY: &str = "connections";

/// Registry of connection handles.
#[derive(Clone)]
pub struct ConnectionRegistry {
    kv: Arc<dyn KvStore>,
}

impl ConnectionRegistry {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Add a handle. Called when a transport accepts a connection.
    pub async fn register(&self, handle: &str) -> StoreResult<()> {
        if self.kv.set_add(CONNECTIONS_KEY, handle).await? {
            debug!("Registered connection {}", handle);
        }
        Ok(())
    }

    /// Remove a handle. Called on disconnect and when delivery finds it gone.
    pub async fn unregister(&self, handle: &str) -> StoreResult<()> {
        if self.kv.set_remove(CONNECTIONS_KEY, handle).await? {
            debug!("Unregistered connection {}", handle);
        }
        Ok(())
    }

    pub async fn members(&self) -> StoreResult<Vec<String>> {
        self.kv.set_members(CONNECTIONS_KEY).await
    }

    pub async fn contains(&self, handle: &str) -> StoreResult<bool> {
        Ok(self.members().await?.iter().any(|m| m == handle))
    }
}
