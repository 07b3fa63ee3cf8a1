use std::collections::BTreeSet;

use tracing::debug;

use crate::store::{StoreError, StoreManager};

/// Name of the set holding every known channel id.
pub const CHANNELS_SET: &str = "channels";

const PROPERTIES_KEY: &str = "properties";

/// Channel persistence on top of a [`StoreManager`].
///
/// Records live at `channels:<id>:properties`; the id set at `channels`.
#[derive(Clone, Debug)]
pub struct ChannelStore {
    root: StoreManager,
}

impl ChannelStore {
    pub fn new(root: StoreManager) -> Self {
        Self { root }
    }

    pub fn in_memory() -> Self {
        Self::new(StoreManager::in_memory())
    }

    fn channel(&self, id: &str) -> StoreManager {
        self.root.sub_manager(CHANNELS_SET).sub_manager(id)
    }

    /// Raw JSON text of the channel's properties, if any.
    pub async fn get(&self, id: &str) -> Result<Option<String>, StoreError> {
        self.channel(id).get(PROPERTIES_KEY).await
    }

    pub async fn set(&self, id: &str, raw: &str) -> Result<(), StoreError> {
        debug!(channel = id, "storing channel properties");
        self.channel(id).set(PROPERTIES_KEY, raw).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        debug!(channel = id, "deleting channel properties");
        self.channel(id).delete(PROPERTIES_KEY).await
    }

    pub async fn add_to_set(&self, set: &str, id: &str) -> Result<bool, StoreError> {
        self.root.sadd(set, id).await
    }

    pub async fn remove_from_set(&self, set: &str, id: &str) -> Result<bool, StoreError> {
        self.root.srem(set, id).await
    }

    pub async fn members_of(&self, set: &str) -> Result<BTreeSet<String>, StoreError> {
        self.root.smembers(set).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, StoreBackend};
    use std::sync::Arc;

    #[tokio::test]
    async fn records_live_under_channel_namespace() {
        let backend = Arc::new(InMemoryStore::new());
        let store = ChannelStore::new(StoreManager::new(backend.clone()));

        store.set("abc", r#"{"type":"telnet"}"#).await.unwrap();
        store.add_to_set(CHANNELS_SET, "abc").await.unwrap();

        assert_eq!(
            backend.get("channels:abc:properties").await.unwrap().as_deref(),
            Some(r#"{"type":"telnet"}"#)
        );
        assert!(backend.smembers("channels").await.unwrap().contains("abc"));
        assert_eq!(store.get("abc").await.unwrap().as_deref(), Some(r#"{"type":"telnet"}"#));
    }

    #[tokio::test]
    async fn delete_and_remove() {
        let store = ChannelStore::in_memory();
        store.set("abc", "{}").await.unwrap();
        store.add_to_set(CHANNELS_SET, "abc").await.unwrap();
        store.add_to_set(CHANNELS_SET, "def").await.unwrap();

        assert!(store.delete("abc").await.unwrap());
        assert!(store.remove_from_set(CHANNELS_SET, "abc").await.unwrap());
        assert_eq!(store.get("abc").await.unwrap(), None);

        let ids: Vec<_> = store.members_of(CHANNELS_SET).await.unwrap().into_iter().collect();
        assert_eq!(ids, vec!["def"]);
    }
}
