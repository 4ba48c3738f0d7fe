//! Change containment for batches of changed relative paths.
//!
//! A provider reports many changed paths at once, while a watcher cares about
//! one path and everything above or below it. [`ChangeSet`] wraps one batch
//! and lazily builds a [`PathTrie`] over it, keyed on path segments, so each
//! watcher check costs O(length of the watched path) instead of a scan of the
//! batch.
//!
//! ```text
//! batch ["a/b"]
//!   affects("a")     = true   (descendant changed)
//!   affects("a/b")   = true   (exact)
//!   affects("a/b/c") = true   (ancestor changed)
//!   affects("ab")    = false
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Changed relative paths from one provider delivery.
pub type ChangeBatch = Vec<String>;

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    /// A batch path ends at this node.
    terminal: bool,
}

/// Prefix tree over path segments.
#[derive(Debug, Default)]
pub struct PathTrie {
    root: TrieNode,
}

impl PathTrie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str) {
        let mut node = &mut self.root;
        for segment in segments(path) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.terminal = true;
    }

    /// True if `path` equals an inserted path, is a segment-prefix of one, or
    /// has one as a segment-prefix.
    pub fn contains_related(&self, path: &str) -> bool {
        let mut node = &self.root;
        if node.terminal {
            return true;
        }
        for segment in segments(path) {
            match node.children.get(segment) {
                Some(child) => node = child,
                None => return false,
            }
            if node.terminal {
                return true;
            }
        }
        // Every non-root node leads to at least one inserted path.
        !node.children.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.root.terminal && self.root.children.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for PathTrie {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut trie = Self::new();
        for path in iter {
            trie.insert(path);
        }
        trie
    }
}

/// One batch of changes plus its lazily built containment index.
#[derive(Debug)]
pub struct ChangeSet {
    paths: ChangeBatch,
    index: OnceLock<PathTrie>,
}

impl ChangeSet {
    pub fn new(paths: ChangeBatch) -> Self {
        Self {
            paths,
            index: OnceLock::new(),
        }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths with duplicates removed, in order of first appearance.
    pub fn unique_paths(&self) -> Vec<&str> {
        let mut seen = HashSet::with_capacity(self.paths.len());
        self.paths
            .iter()
            .map(String::as_str)
            .filter(|p| seen.insert(*p))
            .collect()
    }

    /// Does this batch affect `path`, exactly or through an ancestor or descendant?
    pub fn affects(&self, path: &str) -> bool {
        self.index
            .get_or_init(|| self.paths.iter().map(String::as_str).collect())
            .contains_related(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(paths: &[&str]) -> ChangeSet {
        ChangeSet::new(paths.iter().map(|p| p.to_string()).collect())
    }

    #[test]
    fn test_affects_ancestors_and_descendants() {
        let changes = batch(&["a/b"]);
        assert!(changes.affects("a"));
        assert!(changes.affects("a/b"));
        assert!(changes.affects("a/b/c"));
        assert!(changes.affects(""));
        assert!(!changes.affects("ab"));
        assert!(!changes.affects("a/c"));
        assert!(!changes.affects("b"));
    }

    #[test]
    fn test_segment_boundaries() {
        let changes = batch(&["foo"]);
        assert!(!changes.affects("foo2"));
        assert!(!changes.affects("fo"));
        assert!(changes.affects("foo/bar"));
    }

    #[test]
    fn test_empty_batch_affects_nothing() {
        let changes = batch(&[]);
        assert!(changes.is_empty());
        assert!(!changes.affects(""));
        assert!(!changes.affects("a"));
    }

    #[test]
    fn test_root_change_affects_everything() {
        let changes = batch(&[""]);
        assert!(changes.affects(""));
        assert!(changes.affects("anything/at/all"));
    }

    #[test]
    fn test_many_paths() {
        let changes = batch(&[
            "settings.json",
            "snippets/rust.json",
            "backups/ws1/entry.json",
        ]);
        assert!(changes.affects("settings.json"));
        assert!(changes.affects("snippets"));
        assert!(!changes.affects("snippets/go.json"));
        assert!(changes.affects("backups"));
        assert!(changes.affects("backups/ws1"));
        assert!(!changes.affects("backups/ws2"));
        assert!(!changes.affects("keybindings.json"));
    }

    #[test]
    fn test_unique_paths() {
        let changes = batch(&["x/y", "a", "x/y", "a", "b"]);
        assert_eq!(changes.unique_paths(), vec!["x/y", "a", "b"]);
        assert_eq!(changes.paths().len(), 5);
    }

    #[test]
    fn test_trie_is_empty() {
        let mut trie = PathTrie::new();
        assert!(trie.is_empty());
        trie.insert("a");
        assert!(!trie.is_empty());
    }
}
