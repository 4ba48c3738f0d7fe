//! User data providers.
//!
//! A provider stores the bytes behind relative paths and reports changes as
//! batches of relative paths. The filesystem layer never hands a provider a
//! path that failed resolution or classification.

mod local;
mod memory;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::changes::ChangeBatch;
use crate::error::UserDataResult;

pub use local::LocalProvider;
pub use memory::MemoryProvider;

/// Default capacity of a provider's change feed.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// Storage backend for user data, keyed by relative path.
#[async_trait]
pub trait UserDataProvider: Send + Sync {
    /// Read a whole file. Missing files fail with `NotFound`.
    async fn read_file(&self, path: &str) -> UserDataResult<Vec<u8>>;

    /// Replace a file's contents, creating it if needed.
    async fn write_file(&self, path: &str, data: &[u8]) -> UserDataResult<()>;

    /// Relative paths of the direct children of a container.
    async fn list_files(&self, path: &str) -> UserDataResult<Vec<String>>;

    /// Delete a file.
    async fn delete_file(&self, path: &str) -> UserDataResult<()>;

    /// Subscribe to change batches. Dropping the feed cancels it.
    fn subscribe(&self) -> ChangeFeed;
}

/// Broadcast side of a change feed, owned by a provider.
#[derive(Debug, Clone)]
pub struct ChangePublisher {
    tx: broadcast::Sender<ChangeBatch>,
}

impl ChangePublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a batch. Empty batches are dropped.
    ///
    /// Returns the number of feeds that received it.
    pub fn publish(&self, batch: ChangeBatch) -> usize {
        if batch.is_empty() {
            return 0;
        }
        self.tx.send(batch).unwrap_or(0)
    }

    pub fn subscribe(&self) -> ChangeFeed {
        ChangeFeed {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangePublisher {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

/// Ordered stream of change batches from a provider.
pub struct ChangeFeed {
    rx: broadcast::Receiver<ChangeBatch>,
}

impl ChangeFeed {
    /// Receive the next batch, waiting if necessary.
    ///
    /// Returns None once the provider is gone.
    pub async fn recv(&mut self) -> Option<ChangeBatch> {
        loop {
            match self.rx.recv().await {
                Ok(batch) => return Some(batch),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "user data change feed lagged behind");
                }
            }
        }
    }

    /// Receive the next batch without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeBatch> {
        loop {
            match self.rx.try_recv() {
                Ok(batch) => return Some(batch),
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "user data change feed lagged behind");
                }
            }
        }
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed").finish_non_exhaustive()
    }
}
