//! In-process WebSocket transport.
//!
//! Each accepted socket gets a handle and an unbounded outbound queue. The
//! broadcaster delivers by pushing onto the queue; the socket task drains it.
//!
//! Handles are `{node}/{socket}`, where `node` is unique to this transport.
//! The connection registry may be shared with other processes, so a handle
//! with a different node prefix is reported as owned elsewhere and never
//! pruned. A local handle with no queue (or a queue whose socket task has
//! ended) is gone.

use async_trait::async_trait;
use emojiplace_runtime::broadcast::{DeliveryError, Transport};
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Outbound queues of the sockets accepted by this process.
pub struct SocketTransport {
    prefix: String,
    senders: RwLock<HashMap<String, mpsc::UnboundedSender<String>>>,
}

impl Default for SocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketTransport {
    pub fn new() -> Self {
        Self {
            prefix: format!("{}/", Uuid::new_v4()),
            senders: RwLock::new(HashMap::new()),
        }
    }

    /// Whether `handle` was allocated by this transport.
    pub fn owns(&self, handle: &str) -> bool {
        handle.starts_with(&self.prefix)
    }

    /// Allocate a handle and its queue for a new socket.
    pub async fn connect(&self) -> (String, mpsc::UnboundedReceiver<String>) {
        let handle = format!("{}{}", self.prefix, Uuid::new_v4());
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.write().await.insert(handle.clone(), tx);
        (handle, rx)
    }

    pub async fn disconnect(&self, handle: &str) {
        self.senders.write().await.remove(handle);
    }

    pub async fn len(&self) -> usize {
        self.senders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.senders.read().await.is_empty()
    }
}

#[async_trait]
impl Transport for SocketTransport {
    async fn deliver(&self, handle: &str, payload: &str) -> Result<(), DeliveryError> {
        if !self.owns(handle) {
            return Err(DeliveryError::Elsewhere);
        }
        let senders = self.senders.read().await;
        let sender = senders.get(handle).ok_or(DeliveryError::Gone)?;
        sender
            .send(payload.to_string())
            .map_err(|_| DeliveryError::Gone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deliver_to_connected_socket() {
        let transport = SocketTransport::new();
        let (handle, mut rx) = transport.connect().await;

        transport.deliver(&handle, "hello").await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_unknown_and_closed_handles_are_gone() {
        let transport = SocketTransport::new();
        let (handle, rx) = transport.connect().await;
        assert!(transport.owns(&handle));
        let unknown = format!("{}/never-connected", handle.split('/').next().unwrap());
        assert_eq!(transport.deliver(&unknown, "x").await, Err(DeliveryError::Gone));

        drop(rx);
        assert_eq!(transport.deliver(&handle, "x").await, Err(DeliveryError::Gone));

        transport.disconnect(&handle).await;
        assert!(transport.is_empty().await);
    }

    #[tokio::test]
    async fn test_handles_of_other_transports_are_not_gone() {
        let here = SocketTransport::new();
        let there = SocketTransport::new();
        let (theirs, _rx) = there.connect().await;

        assert!(!here.owns(&theirs));
        assert_eq!(here.deliver(&theirs, "x").await, Err(DeliveryError::Elsewhere));
        assert_eq!(here.deliver("legacy-handle", "x").await, Err(DeliveryError::Elsewhere));
    }
}
