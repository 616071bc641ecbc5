//! Best-effort fan-out of canvas events to every registered connection.
//!
//! Deliveries run concurrently. A connection the transport reports as gone is
//! dropped from the registry on the spot. A connection owned by some other
//! transport (another process sharing the registry) is left alone. Any other
//! failure is logged and ignored. Nothing is retried.

use crate::registry::ConnectionRegistry;
use async_trait::async_trait;
use emojiplace_core::event::CanvasEvent;
use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Why a single delivery failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The endpoint no longer exists; the handle should be pruned.
    #[error("Connection is gone")]
    Gone,

    /// The handle belongs to another transport sharing the registry.
    #[error("Connection is owned elsewhere")]
    Elsewhere,

    /// Transient failure; the handle stays registered.
    #[error("Delivery failed: {0}")]
    Failed(String),
}

/// Pushes a serialized event to one connection handle.
///
/// Implemented by the socket layer that owns the actual connections.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, handle: &str, payload: &str) -> Result<(), DeliveryError>;
}

/// What happened during one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub pruned: Vec<String>,
    /// Handles owned by other transports.
    pub skipped: usize,
    pub failed: usize,
}

/// Sends events to every registry member.
#[derive(Clone)]
pub struct Broadcaster {
    registry: ConnectionRegistry,
    transport: Arc<dyn Transport>,
}

impl Broadcaster {
    pub fn new(registry: ConnectionRegistry, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Deliver `event` to every current member, pruning gone ones.
    pub async fn broadcast(&self, event: &CanvasEvent) -> BroadcastReport {
        let payload = match event.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize {} event: {}", event.kind(), e);
                return BroadcastReport::default();
            }
        };

        let members = match self.registry.members().await {
            Ok(members) => members,
            Err(e) => {
                warn!("Connection registry unavailable, dropping {} event: {}", event.kind(), e);
                return BroadcastReport::default();
            }
        };

        if members.is_empty() {
            debug!("No connections for {} event", event.kind());
            return BroadcastReport::default();
        }

        let deliveries = members.iter().map(|handle| {
            let payload = payload.as_str();
            async move { (handle, self.transport.deliver(handle, payload).await) }
        });

        let mut report = BroadcastReport::default();
        for (handle, result) in join_all(deliveries).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::Gone) => {
                    debug!("Pruning stale connection {}", handle);
                    if let Err(e) = self.registry.unregister(handle).await {
                        warn!("Failed to prune connection {}: {}", handle, e);
                    }
                    report.pruned.push(handle.clone());
                }
                Err(DeliveryError::Elsewhere) => report.skipped += 1,
                Err(DeliveryError::Failed(reason)) => {
                    warn!("Failed to deliver {} to {}: {}", event.kind(), handle, reason);
                    report.failed += 1;
                }
            }
        }

        debug!(
            "Broadcast {} to {} connections ({} pruned, {} failed)",
            event.kind(),
            report.delivered,
            report.pruned.len(),
            report.failed
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emojiplace_core::clock::SystemClock;
    use emojiplace_core::types::AgentMessage;
    use emojiplace_store::MemoryKv;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Transport with a scripted outcome per handle; records deliveries.
    #[derive(Default)]
    struct ScriptedTransport {
        outcomes: HashMap<String, DeliveryError>,
        delivered: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedTransport {
        fn failing(mut self, handle: &str, err: DeliveryError) -> Self {
            self.outcomes.insert(handle.to_string(), err);
            self
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn deliver(&self, handle: &str, payload: &str) -> Result<(), DeliveryError> {
            if let Some(err) = self.outcomes.get(handle) {
                return Err(err.clone());
            }
            self.delivered
                .lock()
                .unwrap()
                .push((handle.to_string(), payload.to_string()));
            Ok(())
        }
    }

    fn event() -> CanvasEvent {
        CanvasEvent::AgentMessage(AgentMessage::new("a1", "a2", "hi", 0))
    }

    async fn setup(transport: ScriptedTransport, handles: &[&str]) -> (Broadcaster, Arc<ScriptedTransport>) {
        let registry = ConnectionRegistry::new(Arc::new(MemoryKv::new(Arc::new(SystemClock))));
        for h in handles {
            registry.register(h).await.unwrap();
        }
        let transport = Arc::new(transport);
        (Broadcaster::new(registry, transport.clone()), transport)
    }

    #[tokio::test]
    async fn test_delivers_to_everyone() {
        let (broadcaster, transport) = setup(ScriptedTransport::default(), &["c1", "c2", "c3"]).await;
        let report = broadcaster.broadcast(&event()).await;
        assert_eq!(report.delivered, 3);

        let delivered = transport.delivered.lock().unwrap();
        assert!(delivered.iter().all(|(_, p)| p.contains("\"agent_message\"")));
    }

    #[tokio::test]
    async fn test_gone_member_is_pruned() {
        let transport = ScriptedTransport::default().failing("stale", DeliveryError::Gone);
        let (broadcaster, _) = setup(transport, &["c1", "stale"]).await;

        let report = broadcaster.broadcast(&event()).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.pruned, vec!["stale".to_string()]);
        assert!(!broadcaster.registry().contains("stale").await.unwrap());

        // Absent on the next broadcast.
        let report = broadcaster.broadcast(&event()).await;
        assert_eq!(report.delivered, 1);
        assert!(report.pruned.is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_member_and_others_proceed() {
        let transport =
            ScriptedTransport::default().failing("flaky", DeliveryError::Failed("timeout".into()));
        let (broadcaster, _) = setup(transport, &["c1", "flaky", "c2"]).await;

        let report = broadcaster.broadcast(&event()).await;
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert!(broadcaster.registry().contains("flaky").await.unwrap());
    }

    #[tokio::test]
    async fn test_foreign_member_is_kept() {
        let transport = ScriptedTransport::default().failing("other-node", DeliveryError::Elsewhere);
        let (broadcaster, _) = setup(transport, &["c1", "other-node"]).await;

        let report = broadcaster.broadcast(&event()).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.pruned.is_empty());
        assert!(broadcaster.registry().contains("other-node").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let (broadcaster, _) = setup(ScriptedTransport::default(), &[]).await;
        assert_eq!(broadcaster.broadcast(&event()).await, BroadcastReport::default());
    }
}
