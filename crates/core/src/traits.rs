//! Storage client contract
//!
//! Every backend (local filesystem, S3-compatible object store) implements
//! [`Client`]. Commands only ever talk to `dyn Client`, so they behave the
//! same whatever the backend is.

use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use url::Url;

use crate::error::{Error, Result};
use crate::stream::TaskStream;

/// Coarse entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    File,
    Directory,
}

impl ContentKind {
    pub fn is_dir(self) -> bool {
        self == ContentKind::Directory
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::File => write!(f, "file"),
            ContentKind::Directory => write!(f, "directory"),
        }
    }
}

/// Metadata for one backend entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    /// Name relative to the target the entry was listed from
    pub name: String,
    pub modified: Option<Timestamp>,
    pub size: u64,
    pub kind: ContentKind,
}

impl Content {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            modified: None,
            size,
            kind: ContentKind::File,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modified: None,
            size: 0,
            kind: ContentKind::Directory,
        }
    }

    pub fn with_modified(mut self, modified: Option<Timestamp>) -> Self {
        self.modified = modified;
        self
    }
}

/// Canned bucket ACLs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketAcl {
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
}

impl BucketAcl {
    pub fn as_str(self) -> &'static str {
        match self {
            BucketAcl::Private => "private",
            BucketAcl::PublicRead => "public-read",
            BucketAcl::PublicReadWrite => "public-read-write",
            BucketAcl::AuthenticatedRead => "authenticated-read",
        }
    }
}

impl FromStr for BucketAcl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "private" => Ok(BucketAcl::Private),
            "public-read" | "readonly" => Ok(BucketAcl::PublicRead),
            "public-read-write" | "public" => Ok(BucketAcl::PublicReadWrite),
            "authenticated-read" | "authorized" => Ok(BucketAcl::AuthenticatedRead),
            _ => Err(Error::General(format!("Invalid bucket ACL: {s}"))),
        }
    }
}

impl fmt::Display for BucketAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owned byte stream; dropping it releases the underlying handle
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Entries and per-entry errors, interleaved
pub type ContentStream = TaskStream<Result<Content>>;

/// Capability set every storage backend implements
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Client: Send + Sync {
    /// Metadata for the target itself
    async fn stat(&self) -> Result<Content>;

    /// Enumerate children (or the whole subtree when `recursive`)
    fn list(&self, recursive: bool) -> ContentStream;

    async fn make_bucket(&self) -> Result<()>;

    async fn set_bucket_acl(&self, acl: BucketAcl) -> Result<()>;

    /// Read `length` bytes from `offset`; `(0, 0)` reads the whole object
    ///
    /// Returns the reader and the exact number of bytes it will yield.
    async fn get_object(&self, offset: u64, length: u64) -> Result<(ObjectReader, u64)>;

    /// Write exactly `size` bytes from `data`
    async fn put_object(&self, size: u64, data: ObjectReader) -> Result<()>;

    fn url(&self) -> Url;
}
