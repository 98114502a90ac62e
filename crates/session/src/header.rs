//! Session header: the small key-value document describing a transfer
//! command's identity, arguments, running totals, and resume point
//! (spec.md §3 "Session").

use crate::id::SessionId;
use std::path::PathBuf;
use time::OffsetDateTime;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionHeader {
    pub id: SessionId,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    /// The command this session belongs to (`cp`, `mirror`, ...).
    pub command: String,
    /// The raw command-line arguments, captured verbatim for `session resume`.
    pub command_args: Vec<String>,
    /// Captured global flags (`--quiet`, `--json`, `--debug`, ...) and
    /// command flags, as an opaque document so new flags never require a
    /// header schema migration.
    pub flags: serde_json::Value,
    /// The directory `session resume` changes into before re-invoking the
    /// transfer engine (spec.md §4.6).
    pub root_path: PathBuf,
    pub total_bytes: u64,
    pub total_objects: u64,
    /// Monotone: once set to X, only ever advances to items enumerated
    /// after X (spec.md §3 invariant).
    pub last_completed: Option<String>,
}

impl SessionHeader {
    pub fn new(
        id: SessionId,
        command: impl Into<String>,
        command_args: Vec<String>,
        flags: serde_json::Value,
        root_path: PathBuf,
    ) -> Self {
        Self {
            id,
            created: OffsetDateTime::now_utc(),
            command: command.into(),
            command_args,
            flags,
            root_path,
            total_bytes: 0,
            total_objects: 0,
            last_completed: None,
        }
    }
}
