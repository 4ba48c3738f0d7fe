//! In-memory user data provider.
//!
//! Used for testing and ephemeral profiles. Containers are implicit: a path
//! is listable whenever files exist below it.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::changes::ChangeBatch;
use crate::error::{UserDataError, UserDataResult};
use crate::provider::{ChangeFeed, ChangePublisher, UserDataProvider};
use crate::resolver::{is_backups_path, normalize_relative};

/// In-memory provider.
///
/// Thread-safe via internal `RwLock`. Writes and deletes publish a
/// single-path change batch; [`MemoryProvider::emit`] publishes arbitrary
/// batches. Every provider call is counted.
#[derive(Debug)]
pub struct MemoryProvider {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
    changes: ChangePublisher,
    calls: AtomicUsize,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::with_capacity(super::DEFAULT_FEED_CAPACITY)
    }

    /// Create a provider whose change feed buffers `capacity` batches.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            files: RwLock::new(BTreeMap::new()),
            changes: ChangePublisher::new(capacity),
            calls: AtomicUsize::new(0),
        }
    }

    /// Seed a file without counting a call or publishing a change.
    pub fn insert(&self, path: &str, data: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(normalize_relative(path).to_string(), data.into());
        }
    }

    /// Publish a change batch as if the storage had changed underneath.
    pub fn emit(&self, batch: ChangeBatch) -> usize {
        self.changes.publish(batch)
    }

    /// Number of read/write/list/delete calls received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files
            .read()
            .map(|files| files.contains_key(normalize_relative(path)))
            .unwrap_or(false)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserDataProvider for MemoryProvider {
    async fn read_file(&self, path: &str) -> UserDataResult<Vec<u8>> {
        self.record_call();
        let files = self
            .files
            .read()
            .map_err(|_| UserDataError::other("lock poisoned"))?;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| UserDataError::not_found(path))
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> UserDataResult<()> {
        self.record_call();
        {
            let mut files = self
                .files
                .write()
                .map_err(|_| UserDataError::other("lock poisoned"))?;
            files.insert(path.to_string(), data.to_vec());
        }
        self.changes.publish(vec![path.to_string()]);
        Ok(())
    }

    async fn list_files(&self, path: &str) -> UserDataResult<Vec<String>> {
        self.record_call();
        let files = self
            .files
            .read()
            .map_err(|_| UserDataError::other("lock poisoned"))?;

        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };

        // Direct children only; deeper files surface as their first segment.
        // The backups subtree sits next to home, so the root never lists it.
        let children: BTreeSet<String> = files
            .keys()
            .filter(|key| !path.is_empty() || !is_backups_path(key))
            .filter_map(|key| key.strip_prefix(prefix.as_str()))
            .filter_map(|rest| rest.split('/').next())
            .filter(|name| !name.is_empty())
            .map(|name| format!("{prefix}{name}"))
            .collect();

        Ok(children.into_iter().collect())
    }

    async fn delete_file(&self, path: &str) -> UserDataResult<()> {
        self.record_call();
        let removed = self
            .files
            .write()
            .map_err(|_| UserDataError::other("lock poisoned"))?
            .remove(path);
        match removed {
            Some(_) => {
                self.changes.publish(vec![path.to_string()]);
                Ok(())
            }
            None => Err(UserDataError::not_found(path)),
        }
    }

    fn subscribe(&self) -> ChangeFeed {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_read() {
        let provider = MemoryProvider::new();
        provider.write_file("settings.json", b"{}").await.unwrap();
        assert_eq!(provider.read_file("settings.json").await.unwrap(), b"{}");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_read_missing() {
        let provider = MemoryProvider::new();
        let result = provider.read_file("missing.json").await;
        assert!(matches!(result, Err(UserDataError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_direct_children() {
        let provider = MemoryProvider::new();
        provider.insert("settings.json", "{}");
        provider.insert("snippets/rust.json", "{}");
        provider.insert("snippets/go.json", "{}");
        provider.insert("snippets/nested/deep.json", "{}");
        provider.insert("backups/ws1/entry.json", "{}");

        assert_eq!(
            provider.list_files("").await.unwrap(),
            vec!["settings.json", "snippets"]
        );
        assert_eq!(
            provider.list_files("snippets").await.unwrap(),
            vec!["snippets/go.json", "snippets/nested", "snippets/rust.json"]
        );
        assert_eq!(provider.list_files("backups").await.unwrap(), vec!["backups/ws1"]);
        assert!(provider.list_files("empty").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_writes_and_deletes_publish_changes() {
        let provider = MemoryProvider::new();
        let mut feed = provider.subscribe();

        provider.write_file("a.json", b"1").await.unwrap();
        provider.delete_file("a.json").await.unwrap();
        assert!(provider.delete_file("a.json").await.is_err());

        assert_eq!(feed.recv().await, Some(vec!["a.json".to_string()]));
        assert_eq!(feed.recv().await, Some(vec!["a.json".to_string()]));
        assert_eq!(feed.try_recv(), None);
        assert!(!provider.contains("a.json"));
    }

    #[tokio::test]
    async fn test_insert_is_silent() {
        let provider = MemoryProvider::new();
        let mut feed = provider.subscribe();
        provider.insert("/keybindings.json/", "[]");
        assert!(provider.contains("keybindings.json"));
        assert_eq!(provider.call_count(), 0);
        assert_eq!(feed.try_recv(), None);
    }
}
