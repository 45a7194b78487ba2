//! Advisory per-session lock
//!
//! A running session holds an exclusive lock on `<session-dir>/.locks/<ID>.lock`
//! so a second `resume` of the same id fails instead of interleaving saves.
//! The lock is released when the guard drops, including on process exit.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use super::id::SessionId;
use crate::error::{Error, Result};

/// An open lock file for one session
pub struct SessionLock {
    id: SessionId,
    path: PathBuf,
    lock: fd_lock::RwLock<File>,
}

impl std::fmt::Debug for SessionLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLock")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish()
    }
}

/// Held exclusive lock; released on drop
pub struct SessionLockGuard<'a> {
    _guard: fd_lock::RwLockWriteGuard<'a, File>,
}

impl SessionLock {
    /// Open (creating if needed) the lock file at `path`
    pub fn open(id: SessionId, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        Ok(Self {
            id,
            path,
            lock: fd_lock::RwLock::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the exclusive lock without blocking
    pub fn try_acquire(&mut self) -> Result<SessionLockGuard<'_>> {
        match self.lock.try_write() {
            Ok(guard) => {
                tracing::debug!(session = %self.id, "Acquired session lock");
                Ok(SessionLockGuard { _guard: guard })
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                Err(Error::SessionLocked(self.id.to_string()))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}
