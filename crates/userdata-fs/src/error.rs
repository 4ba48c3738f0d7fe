//! User data error types.

use std::io;
use thiserror::Error;

/// User data error type.
#[derive(Debug, Error)]
pub enum UserDataError {
    /// Resource does not resolve into the user data namespace.
    #[error("invalid user data resource: {0}")]
    InvalidResource(String),

    /// Expected a container (listing a leaf).
    #[error("not a user data container: {0}")]
    NotAContainer(String),

    /// Expected a leaf (reading, writing or deleting a container).
    #[error("not a user data file: {0}")]
    NotALeaf(String),

    /// Operation is never supported by this filesystem.
    #[error("{0} is not supported")]
    Unsupported(&'static str),

    /// File not found in the provider.
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// The provider's change watcher failed.
    #[error("watch error: {0}")]
    Watch(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl UserDataError {
    /// Create an InvalidResource error.
    pub fn invalid_resource(resource: impl ToString) -> Self {
        Self::InvalidResource(resource.to_string())
    }

    /// Create a NotAContainer error.
    pub fn not_a_container(resource: impl ToString) -> Self {
        Self::NotAContainer(resource.to_string())
    }

    /// Create a NotALeaf error.
    pub fn not_a_leaf(resource: impl ToString) -> Self {
        Self::NotALeaf(resource.to_string())
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Map an I/O error for `path`, keeping missing files distinguishable.
    pub fn from_io(err: io::Error, path: &str) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_string())
        } else {
            Self::Io(err)
        }
    }

    /// Returns true if this error was raised before reaching the provider.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidResource(_) | Self::NotAContainer(_) | Self::NotALeaf(_) | Self::Unsupported(_)
        )
    }
}

impl From<notify::Error> for UserDataError {
    fn from(e: notify::Error) -> Self {
        Self::Watch(e.to_string())
    }
}

/// Convert UserDataError to std::io::Error for compatibility.
impl From<UserDataError> for io::Error {
    fn from(e: UserDataError) -> Self {
        match e {
            UserDataError::InvalidResource(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            UserDataError::NotAContainer(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            UserDataError::NotALeaf(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            UserDataError::Unsupported(op) => {
                io::Error::new(io::ErrorKind::Unsupported, format!("{op} is not supported"))
            }
            UserDataError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            UserDataError::Config(msg) => io::Error::new(io::ErrorKind::InvalidData, msg),
            UserDataError::Watch(msg) => io::Error::other(msg),
            UserDataError::Io(e) => e,
            UserDataError::Other(msg) => io::Error::other(msg),
        }
    }
}

/// User data result type.
pub type UserDataResult<T> = Result<T, UserDataError>;
