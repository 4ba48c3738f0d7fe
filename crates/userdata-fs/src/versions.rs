//! Per-path version counters used as synthetic modification times.

use dashmap::DashMap;

/// Version assigned to a path the first time it is seen.
pub const INITIAL_VERSION: u64 = 1;

/// Monotonic per-path counters.
///
/// Entries are never removed or decremented. Each read-modify-write runs
/// under the map's per-key lock, so concurrent bumps never skip or repeat a
/// value.
#[derive(Debug, Default)]
pub struct VersionTracker {
    versions: DashMap<String, u64>,
}

impl VersionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version of `path`, materializing [`INITIAL_VERSION`] on first read.
    pub fn current(&self, path: &str) -> u64 {
        if let Some(version) = self.versions.get(path) {
            return *version;
        }
        *self
            .versions
            .entry(path.to_string())
            .or_insert(INITIAL_VERSION)
    }

    /// Advance `path` by one and return the new version.
    pub fn bump(&self, path: &str) -> u64 {
        let mut version = self
            .versions
            .entry(path.to_string())
            .or_insert(INITIAL_VERSION);
        *version += 1;
        *version
    }

    /// Number of paths with a materialized version.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_current_starts_at_one_and_is_stable() {
        let versions = VersionTracker::new();
        assert!(versions.is_empty());
        assert_eq!(versions.current("settings.json"), 1);
        assert_eq!(versions.current("settings.json"), 1);
        assert_eq!(versions.len(), 1);
    }

    #[test]
    fn test_bump() {
        let versions = VersionTracker::new();
        assert_eq!(versions.bump("a"), 2);
        assert_eq!(versions.bump("a"), 3);
        assert_eq!(versions.current("a"), 3);
        assert_eq!(versions.current("b"), 1);
        assert_eq!(versions.bump("b"), 2);
    }

    #[test]
    fn test_concurrent_bumps_are_serialized() {
        let versions = Arc::new(VersionTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let versions = Arc::clone(&versions);
                std::thread::spawn(move || {
                    (0..100).map(|_| versions.bump("hot")).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        seen.sort_unstable();

        let expected: Vec<u64> = (2..=801).collect();
        assert_eq!(seen, expected);
        assert_eq!(versions.current("hot"), 801);
    }
}
