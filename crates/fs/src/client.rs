//! Filesystem client implementation
//!
//! A local path is addressed the same way an object is: `stat` describes it,
//! `list` walks it, `get_object`/`put_object` stream its bytes.

use std::fs::Metadata;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use jiff::Timestamp;
use stow_core::{
    BucketAcl, Client, Content, ContentStream, Error, ObjectReader, Result, TaskStream,
};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::mpsc;
use url::Url;

/// Client for one local path
#[derive(Debug, Clone)]
pub struct FsClient {
    path: PathBuf,
    url: Url,
}

impl FsClient {
    /// Create a client for `path`, resolved against the working directory
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path = std::path::absolute(path).map_err(|e| Error::from_io(e, path))?;
        let url = Url::from_file_path(&path)
            .map_err(|_| Error::InvalidPath(path.display().to_string()))?;
        Ok(Self { path, url })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

fn modified(meta: &Metadata) -> Option<Timestamp> {
    meta.modified()
        .ok()
        .and_then(|t| Timestamp::try_from(t).ok())
}

fn content(name: String, meta: &Metadata) -> Content {
    let content = if meta.is_dir() {
        Content::dir(name)
    } else {
        Content::file(name, meta.len())
    };
    content.with_modified(modified(meta))
}

/// Metadata of `path`, following a symlink and reporting it if it dangles
async fn resolve(path: &Path) -> Result<(Metadata, bool)> {
    let meta = tokio::fs::symlink_metadata(path)
        .await
        .map_err(|e| Error::from_io(e, path))?;
    if !meta.file_type().is_symlink() {
        return Ok((meta, false));
    }
    match tokio::fs::metadata(path).await {
        Ok(target) => Ok((target, true)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(Error::BrokenSymlink(path.display().to_string()))
        }
        Err(e) => Err(Error::from_io(e, path)),
    }
}

fn join_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Walk `root`, sending entries in name order within each directory
///
/// Recursive walks report files only and do not descend into symlinked
/// directories.
async fn walk(root: PathBuf, recursive: bool, tx: mpsc::Sender<Result<Content>>) {
    let mut pending = vec![String::new()];

    while let Some(prefix) = pending.pop() {
        let dir = if prefix.is_empty() {
            root.clone()
        } else {
            root.join(&prefix)
        };

        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) => {
                if tx.send(Err(Error::from_io(e, &dir))).await.is_err() {
                    return;
                }
                continue;
            }
        };

        let mut names = Vec::new();
        loop {
            match reader.next_entry().await {
                Ok(Some(entry)) => names.push(entry.file_name().to_string_lossy().into_owned()),
                Ok(None) => break,
                Err(e) => {
                    if tx.send(Err(Error::from_io(e, &dir))).await.is_err() {
                        return;
                    }
                    break;
                }
            }
        }
        names.sort();

        let mut subdirs = Vec::new();
        for name in names {
            let path = dir.join(&name);
            let rel = join_name(&prefix, &name);
            let item = match resolve(&path).await {
                Ok((meta, linked)) if meta.is_dir() && recursive => {
                    if !linked {
                        subdirs.push(rel);
                    }
                    continue;
                }
                Ok((meta, _)) => Ok(content(rel, &meta)),
                Err(e) => Err(e),
            };
            if tx.send(item).await.is_err() {
                return;
            }
        }

        // Reversed so the stack pops them in name order.
        pending.extend(subdirs.into_iter().rev());
    }
}

#[async_trait]
impl Client for FsClient {
    async fn stat(&self) -> Result<Content> {
        let (meta, _) = resolve(&self.path).await?;
        Ok(content(self.name(), &meta))
    }

    fn list(&self, recursive: bool) -> ContentStream {
        let root = self.path.clone();
        let name = self.name();
        TaskStream::spawn(stow_core::stream::DEFAULT_BUFFER, move |tx| async move {
            match resolve(&root).await {
                Ok((meta, _)) if meta.is_dir() => walk(root, recursive, tx).await,
                Ok((meta, _)) => {
                    let _ = tx.send(Ok(content(name, &meta))).await;
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        })
    }

    async fn make_bucket(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.path)
            .await
            .map_err(|e| Error::from_io(e, &self.path))
    }

    async fn set_bucket_acl(&self, acl: BucketAcl) -> Result<()> {
        Err(Error::UnsupportedFeature(format!(
            "bucket ACL '{acl}' on a local filesystem"
        )))
    }

    async fn get_object(&self, offset: u64, length: u64) -> Result<(ObjectReader, u64)> {
        let (meta, _) = resolve(&self.path).await?;
        if meta.is_dir() {
            return Err(Error::InvalidPath(format!(
                "{} is a directory",
                self.path.display()
            )));
        }
        let total = meta.len();
        if offset > total {
            return Err(Error::InvalidPath(format!(
                "offset {offset} is beyond the end of {} ({total} bytes)",
                self.path.display()
            )));
        }
        let available = total - offset;
        let size = if length == 0 {
            available
        } else {
            length.min(available)
        };

        let mut file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| Error::from_io(e, &self.path))?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        Ok((Box::pin(file.take(size)), size))
    }

    async fn put_object(&self, size: u64, data: ObjectReader) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::from_io(e, parent))?;
        }
        let mut file = tokio::fs::File::create(&self.path)
            .await
            .map_err(|e| Error::from_io(e, &self.path))?;

        let copied = tokio::io::copy(&mut data.take(size), &mut file).await?;
        file.flush().await?;
        if copied != size {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {size} bytes, source provided {copied}"),
            )));
        }
        tracing::debug!(path = %self.path.display(), size, "Wrote file");
        Ok(())
    }

    fn url(&self) -> Url {
        self.url.clone()
    }
}
