//! # userdata-fs
//!
//! A namespaced "user data" filesystem over an arbitrary storage provider.
//!
//! Callers address user data with [`Resource`]s rooted under a configured
//! home. Providers store bytes by relative path. This crate sits between the
//! two:
//!
//! - [`PathResolver`] - maps resources to relative paths and back; the
//!   `backups` subtree lives next to home instead of inside it
//! - [`ContainerClassifier`] - container vs leaf, root is always a container
//! - [`VersionTracker`] - per-path counters used as modification stamps
//! - [`ChangeSet`] - segment trie answering "does this batch affect path P"
//! - [`UserDataFileSystem`] - stat/read/write/list/delete/watch over it all
//!
//! ## Design Decisions
//!
//! - **Reject before delegating**: resolution and kind checks run before any
//!   provider call, so a provider never sees an inconsistent request.
//! - **Segment-aware prefixes**: `/userdataX` never matches `/userdata`.
//! - **No mkdir/rename**: both fail with [`UserDataError::Unsupported`].

pub mod changes;
pub mod config;
pub mod container;
mod error;
pub mod filesystem;
pub mod provider;
pub mod resolver;
pub mod resource;
mod types;
pub mod versions;

pub use changes::{ChangeBatch, ChangeSet, PathTrie};
pub use config::UserDataConfig;
pub use container::{ContainerClassifier, ContainerRegistry, ContainerSet};
pub use error::{UserDataError, UserDataResult};
pub use filesystem::{ChangeListenerHandle, UserDataFileSystem, Watch};
pub use provider::{ChangeFeed, ChangePublisher, LocalProvider, MemoryProvider, UserDataProvider};
pub use resolver::{BACKUPS, PathResolver};
pub use resource::Resource;
pub use types::{ChangeEvent, ChangeKind, DirEntry, FileKind, FileStat};
pub use versions::VersionTracker;
