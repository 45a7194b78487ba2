//! Persisted session state

use std::fmt;
use std::path::PathBuf;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::id::SessionId;

/// Current schema tag of persisted session records
pub const SESSION_VERSION: &str = "1";

/// Which transfer protocol a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Copy,
    Sync,
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandType::Copy => write!(f, "cp"),
            CommandType::Sync => write!(f, "sync"),
        }
    }
}

/// One unit of pending work: a source and where it goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    pub source: String,
    pub targets: Vec<String>,
    /// Expected length in bytes
    pub length: u64,
}

impl TransferItem {
    pub fn new(source: impl Into<String>, targets: Vec<String>, length: u64) -> Self {
        Self {
            source: source.into(),
            targets,
            length,
        }
    }
}

/// The durable unit of resumable state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub version: String,
    pub id: SessionId,
    pub command_type: CommandType,
    /// Working directory at creation; relative pending paths resolve against it
    pub root_path: PathBuf,
    pub started: Timestamp,
    /// Arguments of the command that created the session
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub pending: Vec<TransferItem>,
}

impl SessionRecord {
    pub fn new(id: SessionId, command_type: CommandType, root_path: impl Into<PathBuf>) -> Self {
        Self {
            version: SESSION_VERSION.to_string(),
            id,
            command_type,
            root_path: root_path.into(),
            started: Timestamp::now(),
            urls: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop the first pending item equal to `item`; returns whether one was found
    pub fn complete(&mut self, item: &TransferItem) -> bool {
        match self.pending.iter().position(|p| p == item) {
            Some(index) => {
                self.pending.remove(index);
                true
            }
            None => false,
        }
    }

    /// Bytes still to transfer
    pub fn pending_bytes(&self) -> u64 {
        self.pending
            .iter()
            .map(|item| item.length * item.targets.len() as u64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> TransferItem {
        TransferItem::new(name, vec![format!("dst/{name}")], 10)
    }

    #[test]
    fn test_new_record_is_empty() {
        let record = SessionRecord::new(SessionId::generate(), CommandType::Copy, "/work");
        assert_eq!(record.version, SESSION_VERSION);
        assert!(record.is_complete());
        assert_eq!(record.root_path, PathBuf::from("/work"));
    }

    #[test]
    fn test_complete_removes_first_match() {
        let mut record = SessionRecord::new(SessionId::generate(), CommandType::Copy, "/work");
        record.pending = vec![item("a"), item("b"), item("a")];

        assert!(record.complete(&item("a")));
        assert_eq!(record.pending, vec![item("b"), item("a")]);
        assert!(!record.complete(&item("zzz")));
        assert_eq!(record.pending.len(), 2);
    }

    #[test]
    fn test_pending_bytes_counts_every_target() {
        let mut record = SessionRecord::new(SessionId::generate(), CommandType::Sync, "/work");
        record.pending = vec![TransferItem::new(
            "a",
            vec!["x/a".to_string(), "y/a".to_string()],
            100,
        )];
        assert_eq!(record.pending_bytes(), 200);
    }

    #[test]
    fn test_command_type_serde() {
        assert_eq!(serde_json::to_string(&CommandType::Copy).unwrap(), "\"copy\"");
        assert_eq!(
            serde_json::from_str::<CommandType>("\"sync\"").unwrap(),
            CommandType::Sync
        );
        assert_eq!(CommandType::Copy.to_string(), "cp");
    }
}
