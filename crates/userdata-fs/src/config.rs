//! User data configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! home = "file:///home/amy/.config/app/User"
//! containers = ["snippets", "globalStorage"]
//! watch_capacity = 64
//! feed_capacity = 256
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::container::ContainerSet;
use crate::error::{UserDataError, UserDataResult};
use crate::provider::DEFAULT_FEED_CAPACITY;
use crate::resource::Resource;

/// Default number of undelivered events buffered per watcher.
pub const DEFAULT_WATCH_CAPACITY: usize = 64;

fn default_watch_capacity() -> usize {
    DEFAULT_WATCH_CAPACITY
}

fn default_feed_capacity() -> usize {
    DEFAULT_FEED_CAPACITY
}

/// Configuration for a user data filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserDataConfig {
    /// Root of the virtual namespace.
    pub home: Resource,
    /// Relative paths that behave as containers (the root always does).
    #[serde(default)]
    pub containers: Vec<String>,
    /// Events buffered per watcher before new ones are dropped.
    #[serde(default = "default_watch_capacity")]
    pub watch_capacity: usize,
    /// Change batches buffered by a provider's feed.
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
}

impl UserDataConfig {
    /// Configuration with defaults for everything but `home`.
    pub fn new(home: Resource) -> Self {
        Self {
            home,
            containers: Vec::new(),
            watch_capacity: DEFAULT_WATCH_CAPACITY,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }

    /// Add a container path.
    pub fn with_container(mut self, path: impl Into<String>) -> Self {
        self.containers.push(path.into());
        self
    }

    pub fn from_toml_str(source: &str) -> UserDataResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| UserDataError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> UserDataResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)
            .map_err(|e| UserDataError::config(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), home = %config.home, "loaded user data config");
        Ok(config)
    }

    pub fn validate(&self) -> UserDataResult<()> {
        if self.watch_capacity == 0 {
            return Err(UserDataError::config("watch_capacity must be at least 1"));
        }
        if self.feed_capacity == 0 {
            return Err(UserDataError::config("feed_capacity must be at least 1"));
        }
        if self.home.has_dot_segments() {
            return Err(UserDataError::config(format!(
                "home must not contain . or .. segments: {}",
                self.home
            )));
        }
        Ok(())
    }

    /// Container registry built from `containers`.
    pub fn container_set(&self) -> ContainerSet {
        self.containers.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerRegistry;

    #[test]
    fn test_minimal_config() {
        let config = UserDataConfig::from_toml_str(r#"home = "/home/data""#).unwrap();
        assert_eq!(config.home, Resource::file("/home/data"));
        assert!(config.containers.is_empty());
        assert_eq!(config.watch_capacity, DEFAULT_WATCH_CAPACITY);
        assert_eq!(config.feed_capacity, DEFAULT_FEED_CAPACITY);
    }

    #[test]
    fn test_full_config() {
        let config = UserDataConfig::from_toml_str(
            r#"
            home = "vscode-userdata:///home/data"
            containers = ["snippets", "backups"]
            watch_capacity = 8
            feed_capacity = 16
            "#,
        )
        .unwrap();
        assert_eq!(config.home.scheme(), "vscode-userdata");
        assert_eq!(config.watch_capacity, 8);
        assert_eq!(config.feed_capacity, 16);

        let containers = config.container_set();
        assert!(containers.is_container("snippets"));
        assert!(containers.is_container("backups"));
        assert!(!containers.is_container("settings.json"));
    }

    #[test]
    fn test_invalid_configs() {
        assert!(UserDataConfig::from_toml_str("").is_err());
        assert!(UserDataConfig::from_toml_str(r#"home = "relative""#).is_err());
        assert!(UserDataConfig::from_toml_str(r#"home = "/a/../b""#).is_err());
        assert!(
            UserDataConfig::from_toml_str("home = \"/h\"\nwatch_capacity = 0").is_err()
        );
        assert!(UserDataConfig::from_toml_str("home = \"/h\"\nbogus = 1").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("userdata.toml");
        std::fs::write(&path, "home = \"/home/data\"\ncontainers = [\"snippets\"]\n").unwrap();

        let config = UserDataConfig::load(&path).unwrap();
        assert_eq!(config, UserDataConfig::new(Resource::file("/home/data")).with_container("snippets"));

        let missing = UserDataConfig::load(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(UserDataError::Io(_))));
    }
}
