//! Session persistence
//!
//! One JSON file per session, named by its id, in a dedicated directory.
//! Writes go to a staging file first and are renamed into place, so a reader
//! never observes a partially written record.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::id::SessionId;
use super::lock::SessionLock;
use super::record::{CommandType, SESSION_VERSION, SessionRecord};
use crate::error::{Error, Result};

const STAGING_DIR: &str = ".staging";
const LOCKS_DIR: &str = ".locks";
const MAX_CREATE_ATTEMPTS: usize = 16;

/// Storage operations the session lifecycle depends on
#[cfg_attr(test, mockall::automock)]
pub trait SessionStorage: Send + Sync {
    /// Allocate an unused id and persist a fresh record with no pending work
    fn create(&self, command_type: CommandType, root_path: PathBuf) -> Result<SessionRecord>;

    /// Replace the stored record with `record`
    fn save(&self, record: &SessionRecord) -> Result<()>;

    fn load(&self, id: &SessionId) -> Result<SessionRecord>;

    /// Every stored record, in directory order
    fn list(&self) -> Result<Vec<SessionRecord>>;

    fn remove(&self, id: &SessionId) -> Result<()>;

    /// Remove every stored record; returns how many were removed
    fn remove_all(&self) -> Result<usize>;

    /// The advisory lock guarding `id` against concurrent runs
    fn lock(&self, id: &SessionId) -> Result<SessionLock>;
}

/// Directory-backed [`SessionStorage`]
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(id.as_str())
    }

    fn lock_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(LOCKS_DIR).join(format!("{id}.lock"))
    }

    fn ensure_dirs(&self) -> Result<PathBuf> {
        let staging = self.dir.join(STAGING_DIR);
        std::fs::create_dir_all(&staging)?;
        Ok(staging)
    }

    fn stage(&self, record: &SessionRecord) -> Result<NamedTempFile> {
        let staging = self.ensure_dirs()?;
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| Error::General(format!("Failed to serialize session: {e}")))?;

        let mut tmp = NamedTempFile::new_in(staging)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }

    fn regular_files(&self) -> Result<Vec<String>> {
        self.ensure_dirs()?;
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            // file_type() does not follow symlinks
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }
}

impl SessionStorage for SessionStore {
    fn create(&self, command_type: CommandType, root_path: PathBuf) -> Result<SessionRecord> {
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let record = SessionRecord::new(SessionId::generate(), command_type, root_path.clone());
            let tmp = self.stage(&record)?;
            match tmp.persist_noclobber(self.record_path(&record.id)) {
                Ok(_) => {
                    tracing::debug!(session = %record.id, "Created session");
                    return Ok(record);
                }
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::debug!(session = %record.id, "Session id collision, retrying");
                }
                Err(e) => return Err(Error::Io(e.error)),
            }
        }
        Err(Error::General(
            "Unable to allocate an unused session id".to_string(),
        ))
    }

    fn save(&self, record: &SessionRecord) -> Result<()> {
        let tmp = self.stage(record)?;
        tmp.persist(self.record_path(&record.id))
            .map_err(|e| Error::Io(e.error))?;
        tracing::debug!(session = %record.id, pending = record.pending.len(), "Saved session");
        Ok(())
    }

    fn load(&self, id: &SessionId) -> Result<SessionRecord> {
        let path = self.record_path(id);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::InvalidSessionId(id.to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let corrupt = |reason: String| Error::SessionCorrupt {
            id: id.to_string(),
            reason,
        };

        let record: SessionRecord =
            serde_json::from_slice(&data).map_err(|e| corrupt(e.to_string()))?;
        if record.version != SESSION_VERSION {
            return Err(corrupt(format!(
                "unsupported session version '{}'",
                record.version
            )));
        }
        if &record.id != id {
            return Err(corrupt(format!("file holds session '{}'", record.id)));
        }
        Ok(record)
    }

    fn list(&self) -> Result<Vec<SessionRecord>> {
        self.regular_files()?
            .iter()
            .map(|name| {
                let id: SessionId = name.parse()?;
                self.load(&id)
            })
            .collect()
    }

    fn remove(&self, id: &SessionId) -> Result<()> {
        match std::fs::remove_file(self.record_path(id)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::InvalidSessionId(id.to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        }
        // The lock file stays: unlinking it while held would let the next
        // opener lock a fresh inode alongside the current holder.
        tracing::debug!(session = %id, "Removed session");
        Ok(())
    }

    fn remove_all(&self) -> Result<usize> {
        let names = self.regular_files()?;
        for name in &names {
            std::fs::remove_file(self.dir.join(name))?;
        }
        Ok(names.len())
    }

    fn lock(&self, id: &SessionId) -> Result<SessionLock> {
        SessionLock::open(id.clone(), self.lock_path(id))
    }
}
