//! In-memory key-value backend.
//!
//! A single-process stand-in for a Redis-like service. Expiry is lazy: an
//! expired entry is dropped the next time any operation touches its key.

use crate::{KvStore, StoreError, StoreResult};
use async_trait::async_trait;
use emojiplace_core::clock::Clock;
use emojiplace_core::types::Timestamp;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{trace, warn};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(BTreeSet<String>),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Timestamp>,
}

impl Entry {
    fn persistent(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

fn wrong_type(key: &str) -> StoreError {
    warn!("Operation does not match the value type at {}", key);
    StoreError::WrongType(key.to_string())
}

/// In-memory [`KvStore`] with clock-driven expiry.
///
/// # Example
///
/// ```rust
/// use emojiplace_core::clock::ManualClock;
/// use emojiplace_store::{KvStore, MemoryKv};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let clock = Arc::new(ManualClock::new(0));
///     let kv = MemoryKv::new(clock.clone());
///
///     kv.set("greeting", "hi", Some(Duration::from_secs(1))).await?;
///     clock.advance(Duration::from_secs(1));
///     assert_eq!(kv.get("greeting").await?, None);
///
///     Ok(())
/// }
/// ```
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryKv {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("Failed to acquire lock: {}", e)))
    }

    fn expiry(&self, ttl: Duration) -> Timestamp {
        self.clock.now_millis() + ttl.as_millis() as Timestamp
    }

    /// Live entry at `key`, dropping it first if it has expired.
    fn live<'a>(
        &self,
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
    ) -> Option<&'a mut Entry> {
        let now = self.clock.now_millis();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            trace!("Key expired: {}", key);
            entries.remove(key);
        }
        entries.get_mut(key)
    }

    /// Number of live keys. Test helper.
    pub fn len(&self) -> usize {
        let now = self.clock.now_millis();
        self.entries
            .lock()
            .map(|e| e.values().filter(|v| !v.is_expired(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.lock()?;
        match self.live(&mut entries, key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let expires_at = ttl.map(|t| self.expiry(t));
        let mut entries = self.lock()?;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at,
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let expires_at = Some(self.expiry(ttl));
        let mut entries = self.lock()?;
        if self.live(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut entries = self.lock()?;
        let existed = self.live(&mut entries, key).is_some();
        entries.remove(key);
        Ok(existed)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let mut entries = self.lock()?;
        let matches = matches!(
            self.live(&mut entries, key),
            Some(Entry { value: Value::Str(s), .. }) if s.as_str() == expected
        );
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let now = self.clock.now_millis();
        let mut entries = self.lock()?;
        Ok(self
            .live(&mut entries, key)
            .and_then(|e| e.expires_at)
            .map(|at| Duration::from_millis(at.saturating_sub(now))))
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut entries = self.lock()?;
        if self.live(&mut entries, key).is_none() {
            entries.insert(key.to_string(), Entry::persistent(Value::Set(BTreeSet::new())));
        }
        match entries.get_mut(key).map(|e| &mut e.value) {
            Some(Value::Set(set)) => Ok(set.insert(member.to_string())),
            _ => Err(wrong_type(key)),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut entries = self.lock()?;
        match self.live(&mut entries, key).map(|e| &mut e.value) {
            None => Ok(false),
            Some(Value::Set(set)) => Ok(set.remove(member)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut entries = self.lock()?;
        match self.live(&mut entries, key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn list_push(&self, key: &str, value: &str) -> StoreResult<usize> {
        let mut entries = self.lock()?;
        if self.live(&mut entries, key).is_none() {
            entries.insert(key.to_string(), Entry::persistent(Value::List(VecDeque::new())));
        }
        match entries.get_mut(key).map(|e| &mut e.value) {
            Some(Value::List(list)) => {
                list.push_back(value.to_string());
                Ok(list.len())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn list_range(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut entries = self.lock()?;
        match self.live(&mut entries, key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::List(list)) => Ok(list.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn list_drop_front(&self, key: &str, count: usize) -> StoreResult<usize> {
        let mut entries = self.lock()?;
        match self.live(&mut entries, key).map(|e| &mut e.value) {
            None => Ok(0),
            Some(Value::List(list)) => {
                let n = count.min(list.len());
                list.drain(..n);
                Ok(n)
            }
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn list_retain_last(&self, key: &str, keep: usize) -> StoreResult<usize> {
        let mut entries = self.lock()?;
        match self.live(&mut entries, key).map(|e| &mut e.value) {
            None => Ok(0),
            Some(Value::List(list)) => {
                let n = list.len().saturating_sub(keep);
                list.drain(..n);
                Ok(n)
            }
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let now = self.clock.now_millis();
        let entries = self.lock()?;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emojiplace_core::clock::ManualClock;

    fn kv() -> (Arc<ManualClock>, MemoryKv) {
        let clock = Arc::new(ManualClock::new(1_000));
        let kv = MemoryKv::new(clock.clone());
        (clock, kv)
    }

    #[tokio::test]
    async fn test_get_set_delete() {
        let (_, kv) = kv();
        assert_eq!(kv.get("a").await.unwrap(), None);
        kv.set("a", "1", None).await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), Some("1".into()));
        kv.set("a", "2", None).await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), Some("2".into()));
        assert!(kv.delete("a").await.unwrap());
        assert!(!kv.delete("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_expiry_is_exact() {
        let (clock, kv) = kv();
        kv.set("a", "1", Some(Duration::from_secs(30))).await.unwrap();

        clock.advance(Duration::from_millis(29_999));
        assert_eq!(kv.get("a").await.unwrap(), Some("1".into()));
        assert_eq!(kv.ttl("a").await.unwrap(), Some(Duration::from_millis(1)));

        clock.advance(Duration::from_millis(1));
        assert_eq!(kv.get("a").await.unwrap(), None);
        assert_eq!(kv.ttl("a").await.unwrap(), None);
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn test_set_if_absent_respects_expiry() {
        let (clock, kv) = kv();
        let ttl = Duration::from_secs(5);
        assert!(kv.set_if_absent("lease", "a", ttl).await.unwrap());
        assert!(!kv.set_if_absent("lease", "b", ttl).await.unwrap());
        assert_eq!(kv.get("lease").await.unwrap(), Some("a".into()));

        clock.advance(ttl);
        assert!(kv.set_if_absent("lease", "b", ttl).await.unwrap());
        assert_eq!(kv.get("lease").await.unwrap(), Some("b".into()));
    }

    #[tokio::test]
    async fn test_delete_if_equals() {
        let (_, kv) = kv();
        kv.set("lease", "owner", None).await.unwrap();
        assert!(!kv.delete_if_equals("lease", "intruder").await.unwrap());
        assert!(kv.delete_if_equals("lease", "owner").await.unwrap());
        assert_eq!(kv.get("lease").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sets() {
        let (_, kv) = kv();
        assert!(kv.set_add("conns", "c1").await.unwrap());
        assert!(!kv.set_add("conns", "c1").await.unwrap());
        kv.set_add("conns", "c2").await.unwrap();
        assert_eq!(kv.set_members("conns").await.unwrap(), vec!["c1", "c2"]);
        assert!(kv.set_remove("conns", "c1").await.unwrap());
        assert!(!kv.set_remove("conns", "c1").await.unwrap());
        assert_eq!(kv.set_members("conns").await.unwrap(), vec!["c2"]);
    }

    #[tokio::test]
    async fn test_lists() {
        let (_, kv) = kv();
        for v in ["a", "b", "c", "d"] {
            kv.list_push("log", v).await.unwrap();
        }
        assert_eq!(kv.list_drop_front("log", 1).await.unwrap(), 1);
        assert_eq!(kv.list_range("log").await.unwrap(), vec!["b", "c", "d"]);
        assert_eq!(kv.list_retain_last("log", 2).await.unwrap(), 1);
        assert_eq!(kv.list_range("log").await.unwrap(), vec!["c", "d"]);
        assert_eq!(kv.list_retain_last("log", 10).await.unwrap(), 0);
        assert_eq!(kv.list_drop_front("log", 10).await.unwrap(), 2);
        assert!(kv.list_range("log").await.unwrap().is_empty());
        assert_eq!(kv.list_drop_front("missing", 3).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let (_, kv) = kv();
        kv.set("s", "x", None).await.unwrap();
        assert_eq!(
            kv.list_push("s", "y").await,
            Err(StoreError::WrongType("s".into()))
        );
        kv.set_add("set", "m").await.unwrap();
        assert!(kv.get("set").await.is_err());
    }

    #[tokio::test]
    async fn test_scan_prefix_skips_expired() {
        let (clock, kv) = kv();
        kv.set("chunk:0:0", "[]", Some(Duration::from_secs(1))).await.unwrap();
        kv.set("chunk:0:1", "[]", None).await.unwrap();
        kv.set("other", "x", None).await.unwrap();
        assert_eq!(
            kv.scan_prefix("chunk:").await.unwrap(),
            vec!["chunk:0:0", "chunk:0:1"]
        );
        clock.advance(Duration::from_secs(1));
        assert_eq!(kv.scan_prefix("chunk:").await.unwrap(), vec!["chunk:0:1"]);
    }
}
