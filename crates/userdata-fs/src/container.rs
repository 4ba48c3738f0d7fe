//! Container (directory-like) vs leaf (file-like) classification.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

/// Predicate deciding whether a non-root relative path is a container.
pub trait ContainerRegistry: Send + Sync {
    fn is_container(&self, path: &str) -> bool;
}

impl<F> ContainerRegistry for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_container(&self, path: &str) -> bool {
        self(path)
    }
}

/// Registry of explicitly registered container paths (exact match).
#[derive(Debug, Default)]
pub struct ContainerSet {
    paths: RwLock<HashSet<String>>,
}

impl ContainerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a container path. Returns false if it was already known.
    pub fn register(&self, path: impl Into<String>) -> bool {
        let path: String = path.into();
        let inserted = self.paths.write().insert(path.trim_matches('/').to_string());
        if inserted {
            tracing::debug!(path = %path, "registered user data container");
        }
        inserted
    }

    pub fn len(&self) -> usize {
        self.paths.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.read().is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ContainerSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let set = Self::new();
        for path in iter {
            set.register(path);
        }
        set
    }
}

impl ContainerRegistry for ContainerSet {
    fn is_container(&self, path: &str) -> bool {
        self.paths.read().contains(path)
    }
}

/// Classifies relative paths. The root is always a container.
#[derive(Clone)]
pub struct ContainerClassifier {
    registry: Arc<dyn ContainerRegistry>,
}

impl std::fmt::Debug for ContainerClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerClassifier").finish_non_exhaustive()
    }
}

impl ContainerClassifier {
    pub fn new(registry: Arc<dyn ContainerRegistry>) -> Self {
        Self { registry }
    }

    pub fn is_container(&self, path: &str) -> bool {
        path.is_empty() || self.registry.is_container(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_always_container() {
        let never = ContainerClassifier::new(Arc::new(|_: &str| false));
        assert!(never.is_container(""));
        assert!(!never.is_container("settings.json"));
    }

    #[test]
    fn test_delegates_to_registry() {
        let set: ContainerSet = ["snippets", "/globalStorage/"].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(!set.register("snippets"));

        let classifier = ContainerClassifier::new(Arc::new(set));
        assert!(classifier.is_container("snippets"));
        assert!(classifier.is_container("globalStorage"));
        assert!(!classifier.is_container("snippets/rust.json"));
        assert!(!classifier.is_container("snippetsX"));
    }

    #[test]
    fn test_closure_registry() {
        let classifier =
            ContainerClassifier::new(Arc::new(|path: &str| !path.ends_with(".json")));
        assert!(classifier.is_container("backups/ws1"));
        assert!(!classifier.is_container("backups/ws1/entry.json"));
    }
}
