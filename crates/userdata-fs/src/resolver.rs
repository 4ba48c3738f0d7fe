//! Resource <-> relative path translation.
//!
//! Relative paths are normally rooted at `home`. The one exception is the
//! `backups` subtree, which lives next to home rather than inside it:
//!
//! ```text
//! home            = /home/data
//! "settings.json" = /home/data/settings.json
//! "backups/ws1"   = /home/backups/ws1
//! ```

use crate::error::{UserDataError, UserDataResult};
use crate::resource::Resource;

/// First segment of the reserved sibling subtree.
pub const BACKUPS: &str = "backups";

/// Returns true if `path` is `backups` or lies below it.
pub fn is_backups_path(path: &str) -> bool {
    path == BACKUPS
        || path
            .strip_prefix(BACKUPS)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Trim surrounding slashes so a path matches the relative path form.
pub fn normalize_relative(path: &str) -> &str {
    path.trim_matches('/')
}

/// Stateless mapping between resources and provider-relative paths.
#[derive(Debug, Clone)]
pub struct PathResolver {
    home: Resource,
    home_parent: Resource,
}

impl PathResolver {
    pub fn new(home: Resource) -> Self {
        let home_parent = home.parent();
        Self { home, home_parent }
    }

    pub fn home(&self) -> &Resource {
        &self.home
    }

    /// Root of the backups subtree (`parent(home)/backups`).
    pub fn backups_root(&self) -> Resource {
        self.home_parent.join(BACKUPS)
    }

    /// Resolve a resource to its relative path.
    ///
    /// Fails with `InvalidResource` for anything outside home and the
    /// backups subtree, and for paths with `.`/`..` segments. A `backups`
    /// directory inside home is also rejected: the sibling spelling is the
    /// only one that resolves.
    pub fn to_relative(&self, resource: &Resource) -> UserDataResult<String> {
        if resource.has_dot_segments() {
            return Err(UserDataError::invalid_resource(resource));
        }
        if let Some(relative) = resource
            .relative_to(&self.home)
            .filter(|relative| !is_backups_path(relative))
        {
            return Ok(relative);
        }
        match resource.relative_to(&self.home_parent) {
            Some(relative) if is_backups_path(&relative) => Ok(relative),
            _ => Err(UserDataError::invalid_resource(resource)),
        }
    }

    /// Build the resource for a relative path. Never fails.
    pub fn to_resource(&self, path: &str) -> Resource {
        let path = normalize_relative(path);
        if is_backups_path(path) {
            self.home_parent.join(path)
        } else {
            self.home.join(path)
        }
    }
}
