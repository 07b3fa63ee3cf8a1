//! Namespaced key/value storage.
//!
//! Backends only know flat string keys plus named sets. [`StoreManager`]
//! layers `prefix:` namespaces on top, and `sub_manager` hands out a manager
//! scoped one level deeper, so per-channel data lives under
//! `channels:<id>:...` while the id set itself stays global.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Debug,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store document is corrupt: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Flat key/value + set storage.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
    /// Returns whether the member was newly added.
    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError>;
    /// Returns whether the member was present.
    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError>;
    async fn smembers(&self, key: &str) -> Result<BTreeSet<String>, StoreError>;
}

/// A backend handle plus the key prefix it is scoped to.
#[derive(Clone, Debug)]
pub struct StoreManager {
    backend: Arc<dyn StoreBackend>,
    prefix: String,
}

impl StoreManager {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend,
            prefix: String::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    /// A manager whose keys all live under `<prefix><name>:`.
    pub fn sub_manager(&self, name: &str) -> StoreManager {
        StoreManager {
            backend: Arc::clone(&self.backend),
            prefix: format!("{}{}:", self.prefix, name),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.backend.get(&self.key(key)).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.backend.set(&self.key(key), value).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.backend.delete(&self.key(key)).await
    }

    pub async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.backend.sadd(&self.key(key), member).await
    }

    pub async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.backend.srem(&self.key(key), member).await
    }

    pub async fn smembers(&self, key: &str) -> Result<BTreeSet<String>, StoreError> {
        self.backend.smembers(&self.key(key)).await
    }
}

// -----------------------------------------------------------------------------
// In-memory backend
// -----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemoryStore {
    values: DashMap<String, String>,
    sets: DashMap<String, BTreeSet<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).map(|v| v.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let removed_value = self.values.remove(key).is_some();
        let removed_set = self.sets.remove(key).is_some();
        Ok(removed_value || removed_set)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let removed = match self.sets.get_mut(key) {
            Some(mut set) => set.remove(member),
            None => false,
        };
        // an emptied set disappears, like it would in redis
        self.sets.remove_if(key, |_, set| set.is_empty());
        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.sets.get(key).map(|s| s.clone()).unwrap_or_default())
    }
}

// -----------------------------------------------------------------------------
// File backend
// -----------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct FileDocument {
    #[serde(default)]
    values: BTreeMap<String, String>,
    #[serde(default)]
    sets: BTreeMap<String, BTreeSet<String>>,
}

/// Keeps the whole store in one JSON document on disk.
///
/// Every mutation rewrites the document through a temporary file followed by
/// a rename, so readers never observe a half-written file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    doc: Mutex<FileDocument>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let doc = match tokio::fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => FileDocument::default(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => FileDocument::default(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), "opened file store");
        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, doc: &FileDocument) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(doc)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Run `change` on a copy of the document. When it reports a change the
    /// copy is written out and only then replaces the live document.
    async fn commit<T>(
        &self,
        change: impl FnOnce(&mut FileDocument) -> (T, bool),
    ) -> Result<T, StoreError> {
        let mut doc = self.doc.lock().await;
        let mut next = doc.clone();
        let (out, changed) = change(&mut next);
        if changed {
            self.persist(&next).await?;
            *doc = next;
        }
        Ok(out)
    }
}

#[async_trait]
impl StoreBackend for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.doc.lock().await.values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.commit(|doc| {
            doc.values.insert(key.to_string(), value.to_string());
            ((), true)
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.commit(|doc| {
            let removed_value = doc.values.remove(key).is_some();
            let removed_set = doc.sets.remove(key).is_some();
            let removed = removed_value || removed_set;
            (removed, removed)
        })
        .await
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.commit(|doc| {
            let added = doc
                .sets
                .entry(key.to_string())
                .or_default()
                .insert(member.to_string());
            (added, added)
        })
        .await
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.commit(|doc| {
            let removed = doc
                .sets
                .get_mut(key)
                .map(|set| set.remove(member))
                .unwrap_or(false);
            if doc.sets.get(key).is_some_and(BTreeSet::is_empty) {
                doc.sets.remove(key);
            }
            (removed, removed)
        })
        .await
    }

    async fn smembers(&self, key: &str) -> Result<BTreeSet<String>, StoreError> {
        Ok(self
            .doc
            .lock()
            .await
            .sets
            .get(key)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn sub_managers_namespace_keys() {
        let backend = Arc::new(InMemoryStore::new());
        let root = StoreManager::new(backend.clone());
        let chan = root.sub_manager("channels").sub_manager("abc");
        assert_eq!(chan.prefix(), "channels:abc:");

        chan.set("properties", "{}").await.unwrap();
        assert_eq!(
            backend.get("channels:abc:properties").await.unwrap(),
            Some("{}".to_string())
        );
        // the same key under another namespace is a different key
        let other = root.sub_manager("channels").sub_manager("def");
        assert_eq!(other.get("properties").await.unwrap(), None);
        assert_eq!(root.get("properties").await.unwrap(), None);
    }

    #[tokio::test]
    async fn in_memory_sets() {
        let store = InMemoryStore::new();
        assert!(store.sadd("channels", "a").await.unwrap());
        assert!(!store.sadd("channels", "a").await.unwrap());
        store.sadd("channels", "b").await.unwrap();
        let members: Vec<_> = store.smembers("channels").await.unwrap().into_iter().collect();
        assert_eq!(members, vec!["a", "b"]);

        assert!(store.srem("channels", "a").await.unwrap());
        assert!(!store.srem("channels", "a").await.unwrap());
        assert!(store.srem("channels", "b").await.unwrap());
        assert!(store.smembers("channels").await.unwrap().is_empty());
        assert!(store.smembers("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn in_memory_delete_reports_presence() {
        let store = InMemoryStore::new();
        store.set("k", "v").await.unwrap();
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data").join("store.json");

        let store = FileStore::open(&path).await.unwrap();
        store.set("channels:abc:properties", r#"{"type":"telnet"}"#).await.unwrap();
        store.sadd("channels", "abc").await.unwrap();
        store.sadd("channels", "def").await.unwrap();
        store.srem("channels", "def").await.unwrap();
        drop(store);

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("channels:abc:properties").await.unwrap().as_deref(),
            Some(r#"{"type":"telnet"}"#)
        );
        let ids: Vec<_> = reopened.smembers("channels").await.unwrap().into_iter().collect();
        assert_eq!(ids, vec!["abc"]);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn file_store_rejects_corrupt_document() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();
        let err = FileStore::open(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }

    #[tokio::test]
    async fn failed_write_leaves_document_unchanged() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path().join("data").join("store.json"))
            .await
            .unwrap();
        // a plain file where the data directory should be
        std::fs::write(tmp.path().join("data"), "").unwrap();

        assert!(store.set("k", "v").await.is_err());
        assert!(store.sadd("channels", "abc").await.is_err());
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.smembers("channels").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_store_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path().join("missing.json")).await.unwrap();
        assert_eq!(store.get("x").await.unwrap(), None);
        assert!(!store.delete("x").await.unwrap());
    }
}
