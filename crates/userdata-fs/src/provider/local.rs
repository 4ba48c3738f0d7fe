//! Local filesystem provider.
//!
//! Stores user data under a home directory on disk. The `backups` subtree
//! lands in the directory next to home, exactly as the virtual namespace
//! lays it out.

use async_trait::async_trait;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::changes::ChangeBatch;
use crate::error::{UserDataError, UserDataResult};
use crate::provider::{ChangeFeed, ChangePublisher, UserDataProvider};
use crate::resolver::PathResolver;
use crate::resource::Resource;

/// Local filesystem provider.
///
/// If `home` is `/home/amy/.config/app/User`, then `read_file("settings.json")`
/// reads `/home/amy/.config/app/User/settings.json` and
/// `read_file("backups/ws1/entry.json")` reads
/// `/home/amy/.config/app/backups/ws1/entry.json`.
pub struct LocalProvider {
    resolver: PathResolver,
    changes: ChangePublisher,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl std::fmt::Debug for LocalProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProvider")
            .field("home", self.resolver.home())
            .field("watching", &self.is_watching())
            .finish()
    }
}

impl LocalProvider {
    /// Create a provider rooted at `home`.
    ///
    /// The home directory is canonicalized when it exists so that watcher
    /// events (which carry canonical paths) resolve back into the namespace.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self::with_capacity(home, super::DEFAULT_FEED_CAPACITY)
    }

    pub fn with_capacity(home: impl Into<PathBuf>, capacity: usize) -> Self {
        let home: PathBuf = home.into();
        let home = home.canonicalize().unwrap_or(home);
        Self {
            resolver: PathResolver::new(Resource::from_path(&home)),
            changes: ChangePublisher::new(capacity),
            watcher: Mutex::new(None),
        }
    }

    pub fn home_dir(&self) -> PathBuf {
        self.resolver.home().to_path_buf()
    }

    /// Disk location of a relative path.
    ///
    /// Rejects `..` segments, which would escape the namespace.
    fn disk_path(&self, path: &str) -> UserDataResult<PathBuf> {
        if path.split('/').any(|s| s == "..") {
            return Err(UserDataError::invalid_resource(path));
        }
        Ok(self.resolver.to_resource(path).to_path_buf())
    }

    /// Relative paths for the disk paths of one watcher event.
    fn event_batch(resolver: &PathResolver, paths: &[PathBuf]) -> ChangeBatch {
        paths
            .iter()
            .filter_map(|p| resolver.to_relative(&Resource::from_path(p)).ok())
            .collect()
    }

    /// Start publishing disk changes on the change feed.
    ///
    /// Watches home and the backups directory recursively, creating either
    /// one if missing. Calling this while already watching is a no-op.
    pub fn start_watching(&self) -> UserDataResult<()> {
        let mut slot = self.watcher.lock();
        if slot.is_some() {
            return Ok(());
        }

        let resolver = self.resolver.clone();
        let changes = self.changes.clone();
        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| match result {
                Ok(event) => {
                    if !matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) {
                        return;
                    }
                    let batch = Self::event_batch(&resolver, &event.paths);
                    if !batch.is_empty() {
                        tracing::trace!(paths = ?batch, "user data changed on disk");
                        changes.publish(batch);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "user data watcher error"),
            },
            notify::Config::default(),
        )?;

        let home = self.home_dir();
        std::fs::create_dir_all(&home)?;
        watcher.watch(&home, RecursiveMode::Recursive)?;

        let backups = self.resolver.backups_root().to_path_buf();
        std::fs::create_dir_all(&backups)?;
        watcher.watch(&backups, RecursiveMode::Recursive)?;

        tracing::info!(home = %home.display(), "user data watcher started");
        *slot = Some(watcher);
        Ok(())
    }

    /// Stop the disk watcher. Existing feeds stay open but go quiet.
    pub fn stop_watching(&self) {
        if self.watcher.lock().take().is_some() {
            tracing::info!(home = %self.home_dir().display(), "user data watcher stopped");
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.lock().is_some()
    }

    fn child_path(parent: &str, name: &str) -> String {
        if parent.is_empty() {
            name.to_string()
        } else {
            format!("{parent}/{name}")
        }
    }

    async fn ensure_parent(path: &Path) -> std::io::Result<()> {
        match path.parent() {
            Some(parent) => fs::create_dir_all(parent).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UserDataProvider for LocalProvider {
    async fn read_file(&self, path: &str) -> UserDataResult<Vec<u8>> {
        let disk = self.disk_path(path)?;
        fs::read(&disk)
            .await
            .map_err(|e| UserDataError::from_io(e, path))
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> UserDataResult<()> {
        let disk = self.disk_path(path)?;
        Self::ensure_parent(&disk).await?;
        fs::write(&disk, data)
            .await
            .map_err(|e| UserDataError::from_io(e, path))
    }

    async fn list_files(&self, path: &str) -> UserDataResult<Vec<String>> {
        let disk = self.disk_path(path)?;
        let mut dir = fs::read_dir(&disk)
            .await
            .map_err(|e| UserDataError::from_io(e, path))?;

        let mut children = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            children.push(Self::child_path(path, &name));
        }
        children.sort();
        Ok(children)
    }

    async fn delete_file(&self, path: &str) -> UserDataResult<()> {
        let disk = self.disk_path(path)?;
        fs::remove_file(&disk)
            .await
            .map_err(|e| UserDataError::from_io(e, path))
    }

    fn subscribe(&self) -> ChangeFeed {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup() -> (LocalProvider, TempDir) {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("User");
        std::fs::create_dir_all(&home).unwrap();
        (LocalProvider::new(home), dir)
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (provider, _dir) = setup();
        provider.write_file("settings.json", b"{\"a\":1}").await.unwrap();
        assert_eq!(
            provider.read_file("settings.json").await.unwrap(),
            b"{\"a\":1}"
        );
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (provider, _dir) = setup();
        let result = provider.read_file("missing.json").await;
        assert!(matches!(result, Err(UserDataError::NotFound(p)) if p == "missing.json"));
    }

    #[tokio::test]
    async fn test_backups_live_next_to_home() {
        let (provider, dir) = setup();
        provider
            .write_file("backups/ws1/entry.json", b"backup")
            .await
            .unwrap();

        let on_disk = dir.path().canonicalize().unwrap().join("backups/ws1/entry.json");
        assert_eq!(std::fs::read(on_disk).unwrap(), b"backup");
        assert!(!provider.home_dir().join("backups").exists());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let (provider, _dir) = setup();
        provider.write_file("snippets/rust.json", b"{}").await.unwrap();
        provider.write_file("snippets/go.json", b"{}").await.unwrap();
        provider.write_file("settings.json", b"{}").await.unwrap();

        assert_eq!(
            provider.list_files("").await.unwrap(),
            vec!["settings.json", "snippets"]
        );
        assert_eq!(
            provider.list_files("snippets").await.unwrap(),
            vec!["snippets/go.json", "snippets/rust.json"]
        );

        provider.delete_file("snippets/go.json").await.unwrap();
        assert_eq!(
            provider.list_files("snippets").await.unwrap(),
            vec!["snippets/rust.json"]
        );
        assert!(matches!(
            provider.delete_file("snippets/go.json").await,
            Err(UserDataError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_parent_escape_blocked() {
        let (provider, _dir) = setup();
        let result = provider.read_file("../outside.txt").await;
        assert!(matches!(result, Err(UserDataError::InvalidResource(_))));
    }

    #[test]
    fn test_event_batch_filters_foreign_paths() {
        let resolver = PathResolver::new(Resource::file("/cfg/User"));
        let batch = LocalProvider::event_batch(
            &resolver,
            &[
                PathBuf::from("/cfg/User/settings.json"),
                PathBuf::from("/cfg/backups/ws1/a.json"),
                PathBuf::from("/cfg/logs/main.log"),
                PathBuf::from("/cfg/User/backups/stray.json"),
                PathBuf::from("/elsewhere"),
            ],
        );
        assert_eq!(batch, vec!["settings.json", "backups/ws1/a.json"]);
    }

    #[tokio::test]
    async fn test_watcher_publishes_disk_changes() {
        let (provider, _dir) = setup();
        let mut feed = provider.subscribe();
        provider.start_watching().unwrap();
        assert!(provider.is_watching());

        std::fs::write(provider.home_dir().join("settings.json"), b"{}").unwrap();

        let found = tokio::time::timeout(Duration::from_secs(10), async {
            while let Some(batch) = feed.recv().await {
                if batch.iter().any(|p| p == "settings.json") {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);
        assert!(found, "expected a change batch for settings.json");

        provider.stop_watching();
        assert!(!provider.is_watching());
    }

    #[tokio::test]
    async fn test_watcher_covers_backups_created_later() {
        let (provider, dir) = setup();
        let backups = dir.path().canonicalize().unwrap().join("backups");
        assert!(!backups.exists());

        let mut feed = provider.subscribe();
        provider.start_watching().unwrap();
        assert!(backups.is_dir());

        std::fs::write(backups.join("entry.json"), b"saved").unwrap();

        let found = tokio::time::timeout(Duration::from_secs(10), async {
            while let Some(batch) = feed.recv().await {
                if batch.iter().any(|p| p == "backups/entry.json") {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);
        assert!(found, "expected a change batch for backups/entry.json");

        provider.stop_watching();
    }
}
