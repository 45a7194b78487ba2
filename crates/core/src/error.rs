//! Error types for stow-core
//!
//! A single closed enum covers configuration, path resolution, session
//! persistence and backend failures. Callers classify errors by matching on
//! the variant, never by inspecting messages.

use std::io;
use std::path::Path;

use thiserror::Error;

/// Result type alias for stow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for stow operations
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration file does not exist
    #[error("Configuration not found: {0}")]
    ConfigNotFound(String),

    /// The configuration file exists but is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Alias not found: {0}")]
    AliasNotFound(String),

    /// A `scheme://` prefix that no backend understands
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedUrlScheme(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// No session with this id exists (or the id is malformed)
    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    /// A session file exists but cannot be turned into a valid record
    #[error("Session '{id}' is corrupt: {reason}")]
    SessionCorrupt { id: String, reason: String },

    /// Another process holds the session lock
    #[error("Session '{0}' is already running in another process")]
    SessionLocked(String),

    /// A filesystem symlink whose target does not exist
    #[error("Broken symlink: {0}")]
    BrokenSymlink(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The downstream consumer of a byte stream went away
    #[error("Broken pipe")]
    BrokenPipe,

    /// Read or write failure against a backend or the local store
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Network error: {0}")]
    Network(String),

    /// Backend failure that has no more specific variant
    #[error("Backend failure: {0}")]
    BackendFailure(String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// An error annotated with the URL of the target it happened on
    #[error("{url}: {source}")]
    Target {
        url: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    General(String),
}

impl Error {
    /// Map an I/O error on `path` to the most specific variant
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
            io::ErrorKind::PermissionDenied => Error::PermissionDenied(path.display().to_string()),
            io::ErrorKind::BrokenPipe => Error::BrokenPipe,
            _ => Error::Io(err),
        }
    }

    /// Attach the URL of the offending target
    pub fn with_target(self, url: impl Into<String>) -> Self {
        Error::Target {
            url: url.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with any target annotations stripped
    pub fn root(&self) -> &Error {
        match self {
            Error::Target { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether an enumeration can skip this entry and keep going
    pub fn is_skippable_entry(&self) -> bool {
        match self {
            Error::BrokenSymlink(_) | Error::NotFound(_) | Error::PermissionDenied(_) => true,
            Error::Target { source, .. } => source.is_skippable_entry(),
            Error::ConfigNotFound(_)
            | Error::Config(_)
            | Error::AliasNotFound(_)
            | Error::UnsupportedUrlScheme(_)
            | Error::InvalidPath(_)
            | Error::InvalidSessionId(_)
            | Error::SessionCorrupt { .. }
            | Error::SessionLocked(_)
            | Error::BrokenPipe
            | Error::Io(_)
            | Error::Network(_)
            | Error::BackendFailure(_)
            | Error::UnsupportedFeature(_)
            | Error::General(_) => false,
        }
    }

    /// Whether this is a closed downstream pipe
    pub fn is_broken_pipe(&self) -> bool {
        match self.root() {
            Error::BrokenPipe => true,
            Error::Io(e) => e.kind() == io::ErrorKind::BrokenPipe,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_classification() {
        let path = Path::new("/tmp/x");
        assert!(matches!(
            Error::from_io(io::Error::from(io::ErrorKind::NotFound), path),
            Error::NotFound(_)
        ));
        assert!(matches!(
            Error::from_io(io::Error::from(io::ErrorKind::PermissionDenied), path),
            Error::PermissionDenied(_)
        ));
        assert!(matches!(
            Error::from_io(io::Error::from(io::ErrorKind::BrokenPipe), path),
            Error::BrokenPipe
        ));
        assert!(matches!(
            Error::from_io(io::Error::other("disk on fire"), path),
            Error::Io(_)
        ));
    }

    #[test]
    fn test_with_target_display_and_root() {
        let err = Error::BackendFailure("boom".to_string()).with_target("s3://bucket");
        assert_eq!(err.to_string(), "s3://bucket: Backend failure: boom");
        assert!(matches!(err.root(), Error::BackendFailure(_)));
    }

    #[test]
    fn test_skippable_entries() {
        assert!(Error::BrokenSymlink("a".into()).is_skippable_entry());
        assert!(Error::NotFound("a".into()).is_skippable_entry());
        assert!(Error::PermissionDenied("a".into()).is_skippable_entry());
        assert!(!Error::BackendFailure("a".into()).is_skippable_entry());
        assert!(!Error::Network("a".into()).is_skippable_entry());
    }

    #[test]
    fn test_broken_pipe_detection() {
        assert!(Error::BrokenPipe.is_broken_pipe());
        assert!(Error::Io(io::Error::from(io::ErrorKind::BrokenPipe)).is_broken_pipe());
        assert!(!Error::Io(io::Error::from(io::ErrorKind::NotFound)).is_broken_pipe());
    }
}
