//! Per-identity placement cooldown.
//!
//! One record per identity holding the time it next becomes eligible. The
//! record expires exactly at that time, so absence means "eligible now" and
//! nothing ever has to sweep old records.

use emojiplace_core::clock::Clock;
use emojiplace_core::error::remaining_secs;
use emojiplace_core::types::Timestamp;
use emojiplace_store::{KvStore, StoreResult};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

fn cooldown_key(identity: &str) -> String {
    format!("cooldown:{}", identity)
}

/// Whether an identity may place right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CooldownStatus {
    pub eligible: bool,
    /// Time until eligible, serialized as whole seconds rounded up.
    #[serde(serialize_with = "serialize_secs")]
    pub remaining: Duration,
}

fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(remaining_secs(d))
}

impl CooldownStatus {
    pub fn eligible() -> Self {
        Self {
            eligible: true,
            remaining: Duration::ZERO,
        }
    }

    pub fn waiting(remaining: Duration) -> Self {
        Self {
            eligible: false,
            remaining,
        }
    }

    pub fn remaining_secs(&self) -> u64 {
        remaining_secs(&self.remaining)
    }
}

/// Cooldown records over the shared key-value store.
pub struct CooldownLedger {
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    duration: Duration,
}

impl CooldownLedger {
    pub fn new(kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>, duration: Duration) -> Self {
        Self { kv, clock, duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Eligibility of `identity` at the current time.
    pub async fn check(&self, identity: &str) -> StoreResult<CooldownStatus> {
        let Some(raw) = self.kv.get(&cooldown_key(identity)).await? else {
            return Ok(CooldownStatus::eligible());
        };

        // A record we cannot read is treated as absent; it expires on its own.
        let Ok(eligible_at) = raw.parse::<Timestamp>() else {
            debug!("Ignoring malformed cooldown record for {}: {:?}", identity, raw);
            return Ok(CooldownStatus::eligible());
        };

        let now = self.clock.now_millis();
        if now >= eligible_at {
            Ok(CooldownStatus::eligible())
        } else {
            Ok(CooldownStatus::waiting(Duration::from_millis(eligible_at - now)))
        }
    }

    /// Start a fresh cooldown for `identity`. Returns the new eligible-at time.
    pub async fn mark_used(&self, identity: &str) -> StoreResult<Timestamp> {
        let eligible_at = self.clock.now_millis() + self.duration.as_millis() as Timestamp;
        self.kv
            .set(
                &cooldown_key(identity),
                &eligible_at.to_string(),
                Some(self.duration),
            )
            .await?;
        Ok(eligible_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emojiplace_core::clock::ManualClock;
    use emojiplace_store::MemoryKv;

    fn ledger(secs: u64) -> (Arc<ManualClock>, Arc<MemoryKv>, CooldownLedger) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let kv = Arc::new(MemoryKv::new(clock.clone()));
        let ledger = CooldownLedger::new(kv.clone(), clock.clone(), Duration::from_secs(secs));
        (clock, kv, ledger)
    }

    #[tokio::test]
    async fn test_unknown_identity_is_eligible() {
        let (_, _, ledger) = ledger(30);
        let status = ledger.check("nobody").await.unwrap();
        assert!(status.eligible);
        assert_eq!(status.remaining, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_mark_used_then_wait() {
        let (clock, _, ledger) = ledger(30);
        ledger.mark_used("u1").await.unwrap();

        let status = ledger.check("u1").await.unwrap();
        assert!(!status.eligible);
        assert_eq!(status.remaining_secs(), 30);

        clock.advance(Duration::from_secs(10));
        let status = ledger.check("u1").await.unwrap();
        assert!(!status.eligible);
        assert_eq!(status.remaining_secs(), 20);

        clock.advance(Duration::from_secs(20));
        assert!(ledger.check("u1").await.unwrap().eligible);
    }

    #[tokio::test]
    async fn test_record_self_expires() {
        let (clock, kv, ledger) = ledger(30);
        ledger.mark_used("u1").await.unwrap();
        assert_eq!(kv.ttl("cooldown:u1").await.unwrap(), Some(Duration::from_secs(30)));

        clock.advance(Duration::from_secs(30));
        assert_eq!(kv.get("cooldown:u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_eligible_at_never_decreases() {
        let (clock, _, ledger) = ledger(30);
        let first = ledger.mark_used("u1").await.unwrap();
        clock.advance(Duration::from_secs(31));
        let second = ledger.mark_used("u1").await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_identities_are_independent() {
        let (_, _, ledger) = ledger(30);
        ledger.mark_used("u1").await.unwrap();
        assert!(ledger.check("u2").await.unwrap().eligible);
    }

    #[test]
    fn test_status_serializes_seconds() {
        let json = serde_json::to_value(CooldownStatus::waiting(Duration::from_millis(19_200))).unwrap();
        assert_eq!(json["eligible"], false);
        assert_eq!(json["remaining"], 20);
    }
}
