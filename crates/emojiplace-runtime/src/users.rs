//! Display names registered by identities.

use emojiplace_core::error::{PlaceError, PlaceResult};
use emojiplace_core::types::validate_display_name;
use emojiplace_store::{KvStore, StoreResult};
use std::sync::Arc;

fn user_key(identity: &str) -> String {
    format!("user:{}", identity)
}

/// Identity → display name, kept in the shared key-value store.
#[derive(Clone)]
pub struct UserDirectory {
    kv: Arc<dyn KvStore>,
}

impl UserDirectory {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn display_name(&self, identity: &str) -> StoreResult<Option<String>> {
        self.kv.get(&user_key(identity)).await
    }

    /// Validate and store a display name. Returns the trimmed name.
    pub async fn set_display_name(&self, identity: &str, name: &str) -> PlaceResult<String> {
        let name = validate_display_name(name)?;
        self.kv
            .set(&user_key(identity), &name, None)
            .await
            .map_err(|e| PlaceError::StoreUnavailable(e.to_string()))?;
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emojiplace_core::clock::SystemClock;
    use emojiplace_store::MemoryKv;

    #[tokio::test]
    async fn test_set_and_read_display_name() {
        let users = UserDirectory::new(Arc::new(MemoryKv::new(Arc::new(SystemClock))));
        assert_eq!(users.display_name("u1").await.unwrap(), None);

        let name = users.set_display_name("u1", "  Ada ").await.unwrap();
        assert_eq!(name, "Ada");
        assert_eq!(users.display_name("u1").await.unwrap().as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_rejects_bad_names_without_writing() {
        let users = UserDirectory::new(Arc::new(MemoryKv::new(Arc::new(SystemClock))));
        let err = users.set_display_name("u1", &"n".repeat(21)).await.unwrap_err();
        assert_eq!(err.reason(), "validation");
        assert_eq!(users.display_name("u1").await.unwrap(), None);
    }
}
