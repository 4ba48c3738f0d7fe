//! Virtual resource identifiers.
//!
//! A [`Resource`] is a scheme plus a normalized absolute slash path, written
//! `scheme://path` (e.g. `file:///home/data/settings.json`). All prefix tests
//! work on whole path segments, never on raw string prefixes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UserDataError;

/// Scheme used for bare absolute paths.
pub const FILE_SCHEME: &str = "file";

/// A resource in the caller's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resource {
    scheme: String,
    path: String,
}

impl Resource {
    /// Create a resource, normalizing the path.
    ///
    /// The path always starts with `/` and has no empty segments or trailing
    /// slash; the root is `/`.
    pub fn new(scheme: impl Into<String>, path: &str) -> Self {
        Self {
            scheme: scheme.into(),
            path: normalize_path(path),
        }
    }

    /// Create a `file` resource.
    pub fn file(path: &str) -> Self {
        Self::new(FILE_SCHEME, path)
    }

    /// Create a `file` resource from a filesystem path.
    pub fn from_path(path: &Path) -> Self {
        Self::file(&path.to_string_lossy())
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path segments, root first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    pub fn is_root(&self) -> bool {
        self.path == "/"
    }

    /// Returns true if any segment is `.` or `..`.
    pub fn has_dot_segments(&self) -> bool {
        self.segments().any(|s| s == "." || s == "..")
    }

    /// Last path segment, `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// The parent resource. The root is its own parent.
    pub fn parent(&self) -> Self {
        let parent = match self.path.rfind('/') {
            Some(0) | None => "/",
            Some(idx) => &self.path[..idx],
        };
        Self {
            scheme: self.scheme.clone(),
            path: parent.to_string(),
        }
    }

    /// Join a slash-separated relative path onto this resource.
    ///
    /// An empty relative path yields this resource unchanged.
    pub fn join(&self, relative: &str) -> Self {
        Self::new(self.scheme.clone(), &format!("{}/{}", self.path, relative))
    }

    /// Path of `self` relative to `base`, if `self` is `base` or lies below it.
    ///
    /// Matching is on whole segments: `/userdataX` is not below `/userdata`.
    /// Schemes must be equal.
    pub fn relative_to(&self, base: &Resource) -> Option<String> {
        if self.scheme != base.scheme {
            return None;
        }
        if base.is_root() {
            return Some(self.path.trim_start_matches('/').to_string());
        }
        if self.path == base.path {
            return Some(String::new());
        }
        self.path
            .strip_prefix(base.path.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string)
    }

    /// Filesystem path for `file` resources.
    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }
}

/// Normalize a slash path: leading `/`, no empty segments, no trailing `/`.
fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

fn valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.path)
    }
}

impl FromStr for Resource {
    type Err = UserDataError;

    /// Parse `scheme:///abs/path` or a bare absolute path (`file` scheme).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((scheme, path)) = s.split_once("://") {
            // Authorities are not part of the namespace; the path must be absolute.
            if !valid_scheme(scheme) || !path.starts_with('/') {
                return Err(UserDataError::invalid_resource(s));
            }
            return Ok(Self::new(scheme, path));
        }
        if s.starts_with('/') {
            return Ok(Self::file(s));
        }
        Err(UserDataError::invalid_resource(s))
    }
}

impl TryFrom<String> for Resource {
    type Error = UserDataError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Resource> for String {
    fn from(r: Resource) -> Self {
        r.to_string()
    }
}
