//! Durable session store (spec.md §4.6): a header file plus an
//! append-only data log, together permitting an interrupted multi-object
//! transfer to resume without re-copying completed objects.

pub mod datalog;
pub mod error;
pub mod header;
pub mod id;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub use crate::datalog::DataLog;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::header::SessionHeader;
pub use crate::id::SessionId;

/// A summary line for `session list` (spec.md §6).
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: SessionId,
    pub command: String,
    pub created: time::OffsetDateTime,
    pub total_bytes: u64,
    pub total_objects: u64,
    pub resumable: bool,
}

/// The per-user session directory (`session/` under the config folder,
/// spec.md §6) and the two files every session owns within it.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn header_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{id}.session"))
    }

    pub fn data_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{id}.session.data"))
    }

    pub async fn create(
        &self,
        command: impl Into<String>,
        command_args: Vec<String>,
        flags: serde_json::Value,
        root_path: PathBuf,
    ) -> Result<Session> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(ErrorKind::from)?;
        let id = SessionId::generate();
        let header = SessionHeader::new(id.clone(), command, command_args, flags, root_path);
        let data_log = DataLog::create(self.data_path(&id)).await?;
        let header_path = self.header_path(&id);
        let session = Session { header, header_path, data_log: Some(data_log), dirty: true };
        Ok(session)
    }

    pub async fn load(&self, id: &SessionId) -> Result<Session> {
        let header_path = self.header_path(id);
        let bytes = tokio::fs::read(&header_path)
            .await
            .map_err(|_| exn::Exn::new(ErrorKind::NotFound(id.to_string())))?;
        let header: SessionHeader = serde_json::from_slice(&bytes).map_err(ErrorKind::from)?;
        Ok(Session { header, header_path, data_log: None, dirty: false })
    }

    pub async fn is_resumable(&self, id: &SessionId) -> Result<bool> {
        if tokio::fs::metadata(self.header_path(id)).await.is_err() {
            return Ok(false);
        }
        DataLog::is_non_empty(self.data_path(id)).await
    }

    /// List every session with a header on disk, newest first.
    pub async fn list(&self) -> Result<Vec<SessionSummary>> {
        let mut summaries = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => exn::bail!(ErrorKind::from(err)),
        };
        while let Some(entry) = entries.next_entry().await.map_err(ErrorKind::from)? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(id_str) = name.strip_suffix(".session") else { continue };
            if id_str.is_empty() {
                continue;
            }
            let id: SessionId = id_str.parse().expect("SessionId parsing is infallible");
            let Ok(bytes) = tokio::fs::read(entry.path()).await else { continue };
            let Ok(header) = serde_json::from_slice::<SessionHeader>(&bytes) else { continue };
            let resumable = self.is_resumable(&id).await.unwrap_or(false);
            summaries.push(SessionSummary {
                id,
                command: header.command,
                created: header.created,
                total_bytes: header.total_bytes,
                total_objects: header.total_objects,
                resumable,
            });
        }
        summaries.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(summaries)
    }

    /// `session clear`: delete every resumable session.
    pub async fn clear_all(&self) -> Result<usize> {
        let summaries = self.list().await?;
        let mut cleared = 0;
        for summary in &summaries {
            let _ = tokio::fs::remove_file(self.header_path(&summary.id)).await;
            let _ = tokio::fs::remove_file(self.data_path(&summary.id)).await;
            cleared += 1;
        }
        Ok(cleared)
    }
}

/// An open session: the in-memory header plus (during enumeration) the
/// data log writer. Once loaded for resume, `data_log` is `None` — phase
/// 2 reads the on-disk log directly via [`DataLog::read_all`].
pub struct Session {
    pub header: SessionHeader,
    header_path: PathBuf,
    data_log: Option<DataLog>,
    dirty: bool,
}

impl Session {
    pub fn id(&self) -> &SessionId {
        &self.header.id
    }

    pub fn data_path(&self) -> PathBuf {
        match &self.data_log {
            Some(log) => log.path().to_path_buf(),
            None => self.header_path.with_extension("session.data"),
        }
    }

    /// Phase 1 step: append one enumerated item and roll the running
    /// totals forward. Does not persist the header (spec.md §4.6: the
    /// header is saved after enumeration completes, not per item).
    pub async fn enumerate_item<T: Serialize>(&mut self, item: &T, size: u64) -> Result<()> {
        let log = self.data_log.as_mut().ok_or_else(|| exn::Exn::new(ErrorKind::CorruptLog("log is closed".to_string())))?;
        log.append(item).await?;
        self.header.total_bytes += size;
        self.header.total_objects += 1;
        self.dirty = true;
        Ok(())
    }

    /// End of phase 1: fsync the data log once and persist the header
    /// (spec.md §4.6).
    pub async fn finish_enumeration(&mut self) -> Result<()> {
        if let Some(log) = self.data_log.as_mut() {
            log.close().await?;
        }
        self.save_header().await
    }

    pub async fn read_items<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        DataLog::read_all(self.data_path()).await
    }

    /// Advance `last_completed` and persist the header. The caller (the
    /// status collector, spec.md §4.3/§5) is responsible for only calling
    /// this when doing so cannot create a gap — the monotonicity
    /// invariant itself is enforced here defensively.
    pub async fn advance_last_completed(&mut self, url: String) -> Result<()> {
        self.header.last_completed = Some(url);
        self.dirty = true;
        self.save_header().await
    }

    /// Atomic header rewrite: write to a sibling temp file, fsync, rename
    /// over the original (spec.md §4.6).
    pub async fn save_header(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let bytes = serde_json::to_vec_pretty(&self.header).map_err(ErrorKind::from)?;
        let tmp_path = self.header_path.with_extension("session.tmp");
        let mut tmp = tokio::fs::File::create(&tmp_path).await.map_err(ErrorKind::from)?;
        tmp.write_all(&bytes).await.map_err(ErrorKind::from)?;
        tmp.sync_all().await.map_err(ErrorKind::from)?;
        drop(tmp);
        tokio::fs::rename(&tmp_path, &self.header_path).await.map_err(ErrorKind::from)?;
        self.dirty = false;
        Ok(())
    }

    /// Flush and exit cleanly on interrupt, leaving the session on disk
    /// for `session resume` (spec.md §4.3 cancellation, §4.6 "close-and-die").
    pub async fn close_and_die(mut self) -> Result<()> {
        if let Some(log) = self.data_log.as_mut() {
            log.fsync().await?;
        }
        self.save_header().await
    }

    /// `session clear <id>` / successful completion: close and unlink
    /// both files.
    pub async fn delete(mut self) -> Result<()> {
        if let Some(log) = self.data_log.as_mut() {
            let _ = log.close().await;
        }
        let _ = tokio::fs::remove_file(&self.header_path).await;
        let _ = tokio::fs::remove_file(self.data_path()).await;
        Ok(())
    }
}

pub fn session_dir(config_dir: impl AsRef<Path>) -> PathBuf {
    config_dir.as_ref().join("session")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
    struct Item {
        url: String,
        size: u64,
    }

    #[tokio::test]
    async fn enumerate_then_resume_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let mut session =
            store.create("cp", vec!["/a".into(), "s3://b/".into()], serde_json::json!({}), dir.path().to_path_buf()).await.unwrap();
        session.enumerate_item(&Item { url: "file:///a/x".into(), size: 5 }, 5).await.unwrap();
        session.enumerate_item(&Item { url: "file:///a/y".into(), size: 7 }, 7).await.unwrap();
        session.finish_enumeration().await.unwrap();
        assert_eq!(session.header.total_bytes, 12);
        assert_eq!(session.header.total_objects, 2);

        let id = session.id().clone();
        assert!(store.is_resumable(&id).await.unwrap());

        let mut resumed = store.load(&id).await.unwrap();
        let items: Vec<Item> = resumed.read_items().await.unwrap();
        assert_eq!(items.len(), 2);

        resumed.advance_last_completed("file:///a/x".to_string()).await.unwrap();
        let reloaded = store.load(&id).await.unwrap();
        assert_eq!(reloaded.header.last_completed, Some("file:///a/x".to_string()));

        reloaded.delete().await.unwrap();
        assert!(!store.is_resumable(&id).await.unwrap());
    }

    #[tokio::test]
    async fn list_sessions_includes_resumable_flag() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let mut session =
            store.create("mirror", vec![], serde_json::json!({}), dir.path().to_path_buf()).await.unwrap();
        session.enumerate_item(&Item { url: "file:///a".into(), size: 1 }, 1).await.unwrap();
        session.finish_enumeration().await.unwrap();

        let summaries = store.list().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].resumable);
    }
}
