//! Append-only data log of serialized plan items (spec.md §3, §4.6).
//!
//! Each record is a 4-byte little-endian length prefix followed by that
//! many bytes of JSON. The log is written only during enumeration and
//! read-only during execution (spec.md §5) — there is no in-place
//! mutation, and the sequence is not restartable: a reader consumes it
//! from the front exactly once per resume attempt.

use crate::error::{ErrorKind, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};

pub struct DataLog {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl DataLog {
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(&path).await.map_err(ErrorKind::from)?;
        Ok(Self { path, writer: Some(BufWriter::new(file)) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Not fsynced; the caller fsyncs once at the end
    /// of enumeration (spec.md §4.6 persistence contract).
    pub async fn append<T: Serialize>(&mut self, item: &T) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| exn::Exn::new(ErrorKind::CorruptLog("log is closed".to_string())))?;
        let bytes = serde_json::to_vec(item).map_err(ErrorKind::from)?;
        let len = u32::try_from(bytes.len()).map_err(|_| exn::Exn::new(ErrorKind::CorruptLog("record too large".to_string())))?;
        writer.write_all(&len.to_le_bytes()).await.map_err(ErrorKind::from)?;
        writer.write_all(&bytes).await.map_err(ErrorKind::from)?;
        Ok(())
    }

    /// Fsync once, at enumeration's end (not on every append).
    pub async fn fsync(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().await.map_err(ErrorKind::from)?;
            writer.get_ref().sync_all().await.map_err(ErrorKind::from)?;
        }
        Ok(())
    }

    pub async fn close(&mut self) -> Result<()> {
        self.fsync().await?;
        self.writer = None;
        Ok(())
    }

    /// Read every record back, in append order. The log is small enough
    /// (bounded by the number of objects in one transfer) to load
    /// wholesale rather than stream — phase 2 needs random access to
    /// support fast-forwarding past `last_completed` anyway.
    pub async fn read_all<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
        let mut file = match File::open(path.as_ref()).await {
            Ok(f) => f,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => exn::bail!(ErrorKind::from(err)),
        };
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await.map_err(ErrorKind::from)?;
        let mut items = Vec::new();
        let mut offset = 0usize;
        while offset < buf.len() {
            if offset + 4 > buf.len() {
                exn::bail!(ErrorKind::CorruptLog("truncated length prefix".to_string()));
            }
            let len = u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()) as usize;
            offset += 4;
            if offset + len > buf.len() {
                exn::bail!(ErrorKind::CorruptLog("truncated record".to_string()));
            }
            let record: T = serde_json::from_slice(&buf[offset..offset + len]).map_err(ErrorKind::from)?;
            items.push(record);
            offset += len;
        }
        Ok(items)
    }

    /// Resume eligibility only needs to know whether the log has any
    /// records at all (spec.md §4.6), not how many.
    pub async fn is_non_empty(path: impl AsRef<Path>) -> Result<bool> {
        match tokio::fs::metadata(path.as_ref()).await {
            Ok(metadata) => Ok(metadata.len() > 0),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => exn::bail!(ErrorKind::from(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Item {
        name: String,
        size: u64,
    }

    #[tokio::test]
    async fn append_and_read_all_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.data");
        let mut log = DataLog::create(&path).await.unwrap();
        log.append(&Item { name: "a".into(), size: 5 }).await.unwrap();
        log.append(&Item { name: "b".into(), size: 7 }).await.unwrap();
        log.close().await.unwrap();

        let items: Vec<Item> = DataLog::read_all(&path).await.unwrap();
        assert_eq!(items, vec![Item { name: "a".into(), size: 5 }, Item { name: "b".into(), size: 7 }]);
    }

    #[tokio::test]
    async fn read_all_of_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.data");
        let items: Vec<Item> = DataLog::read_all(&path).await.unwrap();
        assert!(items.is_empty());
    }
}
