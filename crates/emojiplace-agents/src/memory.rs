//! Agent memory persistence.
//!
//! Three kinds of record live in the shared key-value store:
//!
//! - `agent:{id}:memory`: plan, scratchpad and interest point, rewritten by
//!   the agent's own run
//! - `agent:{id}:inbox`: append-only list of messages addressed to the agent
//! - `agent:messages`: the retained log of every message sent
//!
//! Senders only ever append to another agent's inbox; they never rewrite its
//! memory record. The owner drops exactly the entries it has read, so a
//! message that lands mid-run waits for the next one.

use emojiplace_core::types::{AgentMessage, Coord};
use emojiplace_store::{KvStore, StoreResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const MESSAGE_LOG_KEY: &str = "agent:messages";

fn memory_key(agent_id: &str) -> String {
    format!("agent:{}:memory", agent_id)
}

fn inbox_key(agent_id: &str) -> String {
    format!("agent:{}:inbox", agent_id)
}

/// What an agent remembers between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMemory {
    pub agent_id: String,
    pub plan: String,
    pub scratchpad: String,
    /// Unread messages. Filled from the inbox list, never written with the
    /// memory record.
    #[serde(skip)]
    pub inbox: Vec<AgentMessage>,
    pub interest_x: i64,
    pub interest_y: i64,
}

impl AgentMemory {
    pub fn interest(&self) -> Coord {
        Coord::new(self.interest_x, self.interest_y)
    }

    pub fn set_interest(&mut self, coord: Coord) {
        self.interest_x = coord.x;
        self.interest_y = coord.y;
    }
}

fn decode_messages(key: &str, raw: Vec<String>) -> Vec<AgentMessage> {
    raw.into_iter()
        .filter_map(|entry| match serde_json::from_str(&entry) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", key, e);
                None
            }
        })
        .collect()
}

/// An inbox as read at one moment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboxSnapshot {
    pub messages: Vec<AgentMessage>,
    /// Raw list entries read, unreadable ones included. This is what to
    /// pass to [`AgentMemoryStore::drop_read`].
    pub entries: usize,
}

/// Reads and writes agent memory and inboxes.
#[derive(Clone)]
pub struct AgentMemoryStore {
    kv: Arc<dyn KvStore>,
}

impl AgentMemoryStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Load an agent's memory record, `None` if it never ran. The inbox is
    /// read separately with [`inbox`](Self::inbox).
    pub async fn load(&self, agent_id: &str) -> StoreResult<Option<AgentMemory>> {
        let Some(raw) = self.kv.get(&memory_key(agent_id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Persist plan, scratchpad and interest point. The inbox is untouched.
    pub async fn save(&self, memory: &AgentMemory) -> StoreResult<()> {
        let json = serde_json::to_string(memory)?;
        self.kv.set(&memory_key(&memory.agent_id), &json, None).await
    }

    /// Messages waiting for `agent_id`, oldest first.
    pub async fn inbox(&self, agent_id: &str) -> StoreResult<InboxSnapshot> {
        let key = inbox_key(agent_id);
        let raw = self.kv.list_range(&key).await?;
        let entries = raw.len();
        Ok(InboxSnapshot {
            messages: decode_messages(&key, raw),
            entries,
        })
    }

    /// Append a message to its addressee's inbox.
    pub async fn deliver(&self, message: &AgentMessage) -> StoreResult<usize> {
        let json = serde_json::to_string(message)?;
        let len = self.kv.list_push(&inbox_key(&message.to), &json).await?;
        debug!("Delivered message {} to {} ({} waiting)", message.id, message.to, len);
        Ok(len)
    }

    /// Drop the `count` oldest inbox entries.
    pub async fn drop_read(&self, agent_id: &str, count: usize) -> StoreResult<usize> {
        if count == 0 {
            return Ok(0);
        }
        self.kv.list_drop_front(&inbox_key(agent_id), count).await
    }
}

/// The retained log of agent messages.
#[derive(Clone)]
pub struct MessageLog {
    kv: Arc<dyn KvStore>,
}

impl MessageLog {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn append(&self, message: &AgentMessage) -> StoreResult<usize> {
        let json = serde_json::to_string(message)?;
        self.kv.list_push(MESSAGE_LOG_KEY, &json).await
    }

    /// Every retained message, oldest first.
    pub async fn all(&self) -> StoreResult<Vec<AgentMessage>> {
        let raw = self.kv.list_range(MESSAGE_LOG_KEY).await?;
        Ok(decode_messages(MESSAGE_LOG_KEY, raw))
    }

    /// The newest `limit` messages, oldest first.
    pub async fn recent(&self, limit: usize) -> StoreResult<Vec<AgentMessage>> {
        let mut all = self.all().await?;
        let skip = all.len().saturating_sub(limit);
        Ok(all.split_off(skip))
    }

    /// Purge everything but the newest `bound` messages. Returns how many went.
    pub async fn retain_latest(&self, bound: usize) -> StoreResult<usize> {
        self.kv.list_retain_last(MESSAGE_LOG_KEY, bound).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emojiplace_core::clock::SystemClock;
    use emojiplace_store::MemoryKv;

    fn kv() -> Arc<dyn KvStore> {
        Arc::new(MemoryKv::new(Arc::new(SystemClock)))
    }

    fn memory(agent_id: &str) -> AgentMemory {
        AgentMemory {
            agent_id: agent_id.into(),
            plan: "Draw a tree".into(),
            scratchpad: String::new(),
            inbox: Vec::new(),
            interest_x: 10,
            interest_y: -4,
        }
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let store = AgentMemoryStore::new(kv());
        assert_eq!(store.load("a1").await.unwrap(), None);

        store.save(&memory("a1")).await.unwrap();
        let loaded = store.load("a1").await.unwrap().unwrap();
        assert_eq!(loaded, memory("a1"));
        assert_eq!(loaded.interest(), Coord::new(10, -4));
    }

    #[tokio::test]
    async fn test_save_does_not_touch_inbox() {
        let store = AgentMemoryStore::new(kv());
        store.save(&memory("a2")).await.unwrap();
        store
            .deliver(&AgentMessage::new("a1", "a2", "hi", 1))
            .await
            .unwrap();

        // The owner saves a stale copy with an empty inbox.
        store.save(&memory("a2")).await.unwrap();

        let loaded = store.load("a2").await.unwrap().unwrap();
        assert!(loaded.inbox.is_empty());
        let inbox = store.inbox("a2").await.unwrap();
        assert_eq!(inbox.entries, 1);
        assert_eq!(inbox.messages[0].content, "hi");
    }

    #[tokio::test]
    async fn test_drop_read_keeps_late_arrivals() {
        let store = AgentMemoryStore::new(kv());
        store.deliver(&AgentMessage::new("a1", "a2", "first", 1)).await.unwrap();
        let read = store.inbox("a2").await.unwrap().entries;

        store.deliver(&AgentMessage::new("a3", "a2", "late", 2)).await.unwrap();
        assert_eq!(store.drop_read("a2", read).await.unwrap(), 1);

        let inbox = store.inbox("a2").await.unwrap();
        assert_eq!(inbox.messages.len(), 1);
        assert_eq!(inbox.messages[0].content, "late");
    }

    #[tokio::test]
    async fn test_unreadable_inbox_entry_still_counts() {
        let kv = kv();
        let store = AgentMemoryStore::new(kv.clone());
        kv.list_push("agent:a2:inbox", "not json").await.unwrap();
        store.deliver(&AgentMessage::new("a1", "a2", "ok", 1)).await.unwrap();

        let inbox = store.inbox("a2").await.unwrap();
        assert_eq!(inbox.messages.len(), 1);
        assert_eq!(inbox.entries, 2);
    }

    #[tokio::test]
    async fn test_message_log_retention() {
        let log = MessageLog::new(kv());
        for i in 0..5 {
            log.append(&AgentMessage::new("a1", "a2", format!("m{}", i), i))
                .await
                .unwrap();
        }

        let recent = log.recent(2).await.unwrap();
        assert_eq!(recent.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(), ["m3", "m4"]);

        assert_eq!(log.retain_latest(3).await.unwrap(), 2);
        let all = log.all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].content, "m2");
        assert_eq!(log.retain_latest(3).await.unwrap(), 0);
    }
}
