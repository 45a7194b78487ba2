//! Message shapes shared by human and JSON output
//!
//! The JSON field names are stable; scripts depend on them.

use std::fmt;

use jiff::Timestamp;
use jiff::tz::TimeZone;
use serde::Serialize;
use stow_core::{CommandType, Content, ContentKind, SessionRecord};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

fn local_time(ts: Timestamp, tz: &TimeZone) -> String {
    ts.to_zoned(tz.clone()).strftime(TIME_FORMAT).to_string()
}

/// One listed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentMessage {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(rename = "last-modified", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    pub size: String,
    pub name: String,
}

impl ContentMessage {
    /// Render `content` for display; directories get `separator` appended
    pub fn new(content: &Content, separator: char, tz: &TimeZone) -> Self {
        let mut name = content.name.trim_end_matches(['/', separator]).to_string();
        if separator != '/' {
            name = name.replace('/', &separator.to_string());
        }
        if content.kind.is_dir() {
            name.push(separator);
        }

        Self {
            kind: content.kind,
            last_modified: content.modified.map(|ts| local_time(ts, tz)),
            size: humansize::format_size(content.size, humansize::BINARY),
            name,
        }
    }
}

/// An informational line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoMessage {
    #[serde(rename = "info")]
    pub message: String,
}

impl InfoMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for InfoMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A failure report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorMessage {
    pub error: String,
}

impl ErrorMessage {
    pub fn new(error: impl fmt::Display) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.error)
    }
}

/// One completed copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyMessage {
    pub source: String,
    pub target: String,
    pub length: u64,
}

impl fmt::Display for CopyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "‘{}’ -> ‘{}’", self.source, self.target)
    }
}

/// One completed fan-out copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncMessage {
    pub source: String,
    pub targets: Vec<String>,
    pub length: u64,
}

impl fmt::Display for SyncMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let targets: Vec<String> = self.targets.iter().map(|t| format!("‘{t}’")).collect();
        write!(f, "‘{}’ -> {}", self.source, targets.join(", "))
    }
}

/// One stored session, as shown by `session list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub command_type: CommandType,
    pub started: Timestamp,
    pub urls: Vec<String>,
    /// Number of items still to transfer
    pub pending: usize,
}

impl From<&SessionRecord> for SessionMessage {
    fn from(record: &SessionRecord) -> Self {
        Self {
            id: record.id.to_string(),
            command_type: record.command_type,
            started: record.started,
            urls: record.urls.clone(),
            pending: record.pending.len(),
        }
    }
}

impl SessionMessage {
    /// `ID [started] cmd args...`
    pub fn line(&self, tz: &TimeZone) -> String {
        format!(
            "{} [{}] {} {}",
            self.id,
            local_time(self.started, tz),
            self.command_type,
            self.urls.join(" ")
        )
    }
}
