//! User data filesystem types.

use serde::{Deserialize, Serialize};

use crate::resource::Resource;

/// Kind of a user data path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    /// Directory-like: can be listed, cannot be read, written or deleted.
    Container,
    /// File-like: can be read, written and deleted, cannot be listed.
    Leaf,
}

impl FileKind {
    pub fn is_container(&self) -> bool {
        matches!(self, FileKind::Container)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, FileKind::Leaf)
    }
}

/// Synthesized metadata for a user data path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub kind: FileKind,
    /// Version of the path; advances once per change batch that touches it.
    pub modified: u64,
    /// Size in bytes (0 for containers).
    pub size: u64,
}

impl FileStat {
    pub fn container(modified: u64) -> Self {
        Self {
            kind: FileKind::Container,
            modified,
            size: 0,
        }
    }

    pub fn leaf(modified: u64, size: u64) -> Self {
        Self {
            kind: FileKind::Leaf,
            modified,
            size,
        }
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    pub kind: FileKind,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, kind: FileKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Kind of a change delivered to watchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// The resource or something above or below it changed.
    Updated,
}

/// A resource-level change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The watched resource.
    pub resource: Resource,
    pub kind: ChangeKind,
    /// Version of the watched path after this change.
    pub version: u64,
}
