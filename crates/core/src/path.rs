//! Path parsing and resolution
//!
//! Command-line targets are either local paths or `alias/bucket/key` remote
//! paths. A first segment only counts as an alias when it is configured.

use std::fmt;
use std::path::PathBuf;

use url::Url;

use crate::error::{Error, Result};

/// A path on an S3-compatible endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    pub alias: String,
    /// Empty when the path names the alias itself
    pub bucket: String,
    /// Empty when the path names the whole bucket
    pub key: String,
}

impl RemotePath {
    pub fn new(alias: impl Into<String>, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.alias)?;
        if !self.bucket.is_empty() {
            write!(f, "/{}", self.bucket)?;
        }
        if !self.key.is_empty() {
            write!(f, "/{}", self.key)?;
        }
        Ok(())
    }
}

/// A parsed command-line target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPath {
    Local(PathBuf),
    Remote(RemotePath),
}

/// Parse a command-line target
///
/// `is_alias` decides whether the first path segment names a configured alias.
pub fn parse_path(arg: &str, is_alias: impl Fn(&str) -> bool) -> Result<ParsedPath> {
    if arg.is_empty() {
        return Err(Error::InvalidPath("Path cannot be empty".to_string()));
    }

    if let Some((scheme, rest)) = arg.split_once("://") {
        if scheme.eq_ignore_ascii_case("file") {
            if rest.is_empty() {
                return Err(Error::InvalidPath(arg.to_string()));
            }
            // Accepts an empty or `localhost` host; any other host is rejected.
            let path = Url::parse(arg)
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .ok_or_else(|| Error::InvalidPath(arg.to_string()))?;
            return Ok(ParsedPath::Local(path));
        }
        return Err(Error::UnsupportedUrlScheme(arg.to_string()));
    }

    let mut parts = arg.splitn(3, '/');
    let first = parts.next().unwrap_or_default();
    if first.is_empty() || !is_alias(first) {
        return Ok(ParsedPath::Local(PathBuf::from(arg)));
    }

    let bucket = parts.next().unwrap_or_default();
    let key = parts.next().unwrap_or_default();
    Ok(ParsedPath::Remote(RemotePath::new(first, bucket, key)))
}

/// Join a relative entry name onto a target string, keeping one separator
pub fn join_target(base: &str, name: &str) -> String {
    let name = name.trim_start_matches('/');
    if base.is_empty() {
        return name.to_string();
    }
    if base.ends_with('/') || base.ends_with(std::path::MAIN_SEPARATOR) {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}

/// Last non-empty segment of a target string
pub fn base_name(target: &str) -> &str {
    target
        .trim_end_matches(['/', std::path::MAIN_SEPARATOR])
        .rsplit(['/', std::path::MAIN_SEPARATOR])
        .next()
        .unwrap_or(target)
}
