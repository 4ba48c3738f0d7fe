//! The user data filesystem.
//!
//! Routes resource-level operations to a [`UserDataProvider`] by relative
//! path, synthesizes stat metadata, and turns provider change batches into
//! resource-level events for watchers.
//!
//! Every operation resolves and classifies its resource first. Anything that
//! fails there is rejected before the provider is called, and provider
//! errors come back unchanged.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::changes::{ChangeBatch, ChangeSet};
use crate::config::{DEFAULT_WATCH_CAPACITY, UserDataConfig};
use crate::container::ContainerClassifier;
use crate::error::{UserDataError, UserDataResult};
use crate::provider::UserDataProvider;
use crate::resolver::{PathResolver, normalize_relative};
use crate::resource::Resource;
use crate::types::{ChangeEvent, ChangeKind, DirEntry, FileKind, FileStat};
use crate::versions::VersionTracker;

struct WatchEntry {
    path: String,
    resource: Resource,
    tx: mpsc::Sender<ChangeEvent>,
}

#[derive(Default)]
struct WatcherTable {
    entries: DashMap<u64, WatchEntry>,
    next_id: AtomicU64,
}

/// A registered watch on one resource.
///
/// Receives an event whenever a change batch affects the resource, its
/// ancestors or its descendants. Dropping the handle cancels the watch.
pub struct Watch {
    id: u64,
    resource: Resource,
    rx: mpsc::Receiver<ChangeEvent>,
    table: Arc<WatcherTable>,
}

impl Watch {
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Receive the next event, waiting if necessary.
    ///
    /// Returns None once the filesystem that issued the watch is dropped.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Receive the next event without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }

    /// Stop delivery. Version history is kept.
    pub fn cancel(self) {}
}

impl Drop for Watch {
    fn drop(&mut self) {
        if self.table.entries.remove(&self.id).is_some() {
            tracing::debug!(resource = %self.resource, "user data watch cancelled");
        }
    }
}

impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watch")
            .field("id", &self.id)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

/// Handle to a running change listener task.
pub struct ChangeListenerHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ChangeListenerHandle {
    /// Stop the listener and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "user data change listener failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Namespaced user data filesystem over a provider.
pub struct UserDataFileSystem {
    resolver: PathResolver,
    classifier: ContainerClassifier,
    provider: Arc<dyn UserDataProvider>,
    versions: VersionTracker,
    watchers: Arc<WatcherTable>,
    watch_capacity: usize,
}

impl std::fmt::Debug for UserDataFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDataFileSystem")
            .field("home", self.resolver.home())
            .field("watchers", &self.watchers.entries.len())
            .field("versions", &self.versions.len())
            .finish_non_exhaustive()
    }
}

impl Drop for UserDataFileSystem {
    fn drop(&mut self) {
        // Outstanding watches share the table; closing their senders ends recv.
        self.watchers.entries.clear();
    }
}

impl UserDataFileSystem {
    pub fn new(
        resolver: PathResolver,
        classifier: ContainerClassifier,
        provider: Arc<dyn UserDataProvider>,
    ) -> Self {
        Self {
            resolver,
            classifier,
            provider,
            versions: VersionTracker::new(),
            watchers: Arc::new(WatcherTable::default()),
            watch_capacity: DEFAULT_WATCH_CAPACITY,
        }
    }

    pub fn from_config(config: &UserDataConfig, provider: Arc<dyn UserDataProvider>) -> Self {
        let classifier = ContainerClassifier::new(Arc::new(config.container_set()));
        Self::new(PathResolver::new(config.home.clone()), classifier, provider)
            .with_watch_capacity(config.watch_capacity)
    }

    /// Set how many undelivered events each new watch buffers.
    pub fn with_watch_capacity(mut self, capacity: usize) -> Self {
        self.watch_capacity = capacity.max(1);
        self
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn versions(&self) -> &VersionTracker {
        &self.versions
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.entries.len()
    }

    fn kind_of(&self, path: &str) -> FileKind {
        if self.classifier.is_container(path) {
            FileKind::Container
        } else {
            FileKind::Leaf
        }
    }

    fn resolve_leaf(&self, resource: &Resource) -> UserDataResult<String> {
        let path = self.resolver.to_relative(resource)?;
        match self.kind_of(&path) {
            FileKind::Leaf => Ok(path),
            FileKind::Container => Err(UserDataError::not_a_leaf(resource)),
        }
    }

    fn resolve_container(&self, resource: &Resource) -> UserDataResult<String> {
        let path = self.resolver.to_relative(resource)?;
        match self.kind_of(&path) {
            FileKind::Container => Ok(path),
            FileKind::Leaf => Err(UserDataError::not_a_container(resource)),
        }
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Synthesized metadata. Containers never touch the provider; leaves are
    /// read to learn their size.
    pub async fn stat(&self, resource: &Resource) -> UserDataResult<FileStat> {
        let path = self.resolver.to_relative(resource)?;
        if self.classifier.is_container(&path) {
            return Ok(FileStat::container(self.versions.current(&path)));
        }
        let size = self.provider.read_file(&path).await?.len() as u64;
        Ok(FileStat::leaf(self.versions.current(&path), size))
    }

    pub async fn read(&self, resource: &Resource) -> UserDataResult<Vec<u8>> {
        let path = self.resolve_leaf(resource)?;
        self.provider.read_file(&path).await
    }

    pub async fn write(&self, resource: &Resource, data: &[u8]) -> UserDataResult<()> {
        let path = self.resolve_leaf(resource)?;
        tracing::debug!(path = %path, bytes = data.len(), "writing user data");
        self.provider.write_file(&path, data).await
    }

    /// Child resources of a container.
    pub async fn list(&self, resource: &Resource) -> UserDataResult<Vec<Resource>> {
        Ok(self
            .children(resource)
            .await?
            .into_iter()
            .map(|(_, child)| child)
            .collect())
    }

    /// Child entries of a container, each classified.
    pub async fn read_dir(&self, resource: &Resource) -> UserDataResult<Vec<DirEntry>> {
        Ok(self
            .children(resource)
            .await?
            .into_iter()
            .map(|(path, _)| {
                let name = path.rsplit('/').next().unwrap_or(&path);
                DirEntry::new(name, self.kind_of(&path))
            })
            .collect())
    }

    /// Provider children of a container, keeping only those whose resource
    /// sits directly below it.
    async fn children(&self, resource: &Resource) -> UserDataResult<Vec<(String, Resource)>> {
        let path = self.resolve_container(resource)?;
        let children = self.provider.list_files(&path).await?;
        Ok(children
            .iter()
            .filter_map(|child| {
                let child = normalize_relative(child);
                let child_resource = self.resolver.to_resource(child);
                if child_resource.parent() == *resource {
                    Some((child.to_string(), child_resource))
                } else {
                    tracing::debug!(
                        parent = %resource,
                        child = %child_resource,
                        "skipping listed child outside container"
                    );
                    None
                }
            })
            .collect())
    }

    /// Delete a leaf. Containers cannot be deleted.
    pub async fn delete(&self, resource: &Resource) -> UserDataResult<()> {
        let path = self.resolve_leaf(resource)?;
        tracing::debug!(path = %path, "deleting user data");
        self.provider.delete_file(&path).await
    }

    /// Always fails: containers are defined by the registry, not created.
    pub async fn mkdir(&self, _resource: &Resource) -> UserDataResult<()> {
        Err(UserDataError::Unsupported("mkdir"))
    }

    /// Always fails.
    pub async fn rename(&self, _from: &Resource, _to: &Resource) -> UserDataResult<()> {
        Err(UserDataError::Unsupported("rename"))
    }

    // ========================================================================
    // Change tracking
    // ========================================================================

    /// Watch a resource for changes.
    pub fn watch(&self, resource: &Resource) -> UserDataResult<Watch> {
        let path = self.resolver.to_relative(resource)?;
        let (tx, rx) = mpsc::channel(self.watch_capacity);
        let id = self.watchers.next_id.fetch_add(1, Ordering::Relaxed);

        self.watchers.entries.insert(
            id,
            WatchEntry {
                path: path.clone(),
                resource: resource.clone(),
                tx,
            },
        );
        tracing::debug!(resource = %resource, path = %path, "user data watch registered");

        Ok(Watch {
            id,
            resource: resource.clone(),
            rx,
            table: Arc::clone(&self.watchers),
        })
    }

    /// Process one change batch from the provider.
    ///
    /// Each distinct batch path, and each watched path the batch affects, is
    /// bumped exactly once. Every affected watcher gets one event. Returns
    /// the number of watchers notified.
    pub fn handle_changes(&self, batch: ChangeBatch) -> usize {
        let paths: ChangeBatch = batch
            .iter()
            .map(|p| normalize_relative(p).to_string())
            .collect();
        if paths.is_empty() {
            return 0;
        }
        let changes = ChangeSet::new(paths);

        // Snapshot first so no map shard is locked while sending.
        let affected: Vec<(u64, String, Resource, mpsc::Sender<ChangeEvent>)> = self
            .watchers
            .entries
            .iter()
            .filter(|entry| changes.affects(&entry.path))
            .map(|entry| {
                (
                    *entry.key(),
                    entry.path.clone(),
                    entry.resource.clone(),
                    entry.tx.clone(),
                )
            })
            .collect();

        let mut bumped: HashMap<String, u64> = HashMap::new();
        for path in changes.unique_paths() {
            bumped.insert(path.to_string(), self.versions.bump(path));
        }
        for (_, path, _, _) in &affected {
            if !bumped.contains_key(path) {
                bumped.insert(path.clone(), self.versions.bump(path));
            }
        }

        let mut notified = 0;
        for (id, path, resource, tx) in affected {
            let version = bumped
                .get(&path)
                .copied()
                .unwrap_or_else(|| self.versions.current(&path));
            let event = ChangeEvent {
                resource,
                kind: ChangeKind::Updated,
                version,
            };
            match tx.try_send(event) {
                Ok(()) => notified += 1,
                Err(mpsc::error::TrySendError::Full(event)) => {
                    tracing::warn!(
                        resource = %event.resource,
                        "user data watch queue full, dropping change event"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.watchers.entries.remove(&id);
                }
            }
        }

        tracing::debug!(
            paths = changes.paths().len(),
            bumped = bumped.len(),
            notified,
            "processed user data change batch"
        );
        notified
    }

    /// Spawn a task feeding provider change batches into
    /// [`handle_changes`](Self::handle_changes), in delivery order.
    ///
    /// The feed is subscribed before this returns, so no batch published
    /// afterwards is missed.
    pub fn start_change_listener(self: &Arc<Self>) -> ChangeListenerHandle {
        let fs = Arc::clone(self);
        let mut feed = self.provider.subscribe();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        tracing::info!("user data change listener shutting down");
                        break;
                    }
                    batch = feed.recv() => match batch {
                        Some(batch) => {
                            fs.handle_changes(batch);
                        }
                        None => {
                            tracing::debug!("user data change feed closed");
                            break;
                        }
                    }
                }
            }
        });

        tracing::info!(home = %self.resolver.home(), "user data change listener started");
        ChangeListenerHandle { shutdown_tx, task }
    }
}
