//! Expiring mutual-exclusion leases over the shared key-value store.
//!
//! A lease is a key written with set-if-absent and a mandatory expiry. The
//! holder releases it by deleting the key only while it still holds its own
//! token, so a holder whose lease already expired and was taken over cannot
//! release the new owner's lease.

use emojiplace_store::{KvStore, StoreResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// A held lease. Release it with [`LeaseManager::release`]; if the holder
/// never does, the lease lapses on its own after the manager's ttl.
#[derive(Debug)]
pub struct Lease {
    key: String,
    token: String,
}

impl Lease {
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Hands out short-lived leases keyed by resource name.
#[derive(Clone)]
pub struct LeaseManager {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl LeaseManager {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// Same store, different expiry.
    pub fn with_ttl(&self, ttl: Duration) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Try once to take the lease on `resource`. `Ok(None)` means someone
    /// else holds it; callers do not retry.
    pub async fn try_acquire(&self, resource: &str) -> StoreResult<Option<Lease>> {
        let key = format!("lease:{}", resource);
        let token = Uuid::new_v4().to_string();

        if self.kv.set_if_absent(&key, &token, self.ttl).await? {
            debug!("Acquired lease {}", key);
            Ok(Some(Lease { key, token }))
        } else {
            debug!("Lease {} is held elsewhere", key);
            Ok(None)
        }
    }

    /// Give the lease back. Returns `false` if it had already lapsed.
    pub async fn release(&self, lease: Lease) -> StoreResult<bool> {
        let released = self.kv.delete_if_equals(&lease.key, &lease.token).await?;
        if !released {
            warn!("Lease {} lapsed before release", lease.key);
        }
        Ok(released)
    }
}
