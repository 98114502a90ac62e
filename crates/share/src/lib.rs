//! Shared-URL store (spec.md §4.7): a versioned, per-kind catalog of
//! presigned download URLs and upload forms, swept for expiry on every
//! list.

pub mod error;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;

pub use crate::error::{Error, ErrorKind, Result};

/// Bounds on share expiry (spec.md §4.7, §8).
pub const MIN_EXPIRY: Duration = Duration::from_secs(1);
pub const MAX_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub fn validate_expiry(expiry: Duration) -> Result<()> {
    if expiry < MIN_EXPIRY || expiry > MAX_EXPIRY {
        exn::bail!(ErrorKind::ExpiryOutOfBounds(expiry));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareKind {
    Download,
    Upload,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind")]
pub enum Artifact {
    Url { href: String },
    Form { href: String, fields: HashMap<String, String> },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ShareEntry {
    /// The target URL this entry was generated for (the catalog's key).
    pub key: String,
    pub kind: ShareKind,
    #[serde(with = "humantime_serde_duration")]
    pub expiry: Duration,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    pub artifact: Artifact,
}

impl ShareEntry {
    pub fn expired_at(&self, now: OffsetDateTime) -> bool {
        let age = now - self.created;
        age >= time::Duration::try_from(self.expiry).unwrap_or(time::Duration::ZERO)
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ShareCatalog {
    /// Schema version, so a future on-disk shape change can migrate
    /// forward from this one (spec.md §4.7).
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub entries: Vec<ShareEntry>,
}
fn current_version() -> u32 {
    1
}

pub struct ShareStore {
    download_path: PathBuf,
    upload_path: PathBuf,
}

impl ShareStore {
    pub fn new(share_dir: impl AsRef<Path>) -> Self {
        let dir = share_dir.as_ref();
        Self { download_path: dir.join("downloads.json"), upload_path: dir.join("uploads.json") }
    }

    fn path_for(&self, kind: ShareKind) -> &Path {
        match kind {
            ShareKind::Download => &self.download_path,
            ShareKind::Upload => &self.upload_path,
        }
    }

    async fn load(&self, kind: ShareKind) -> Result<ShareCatalog> {
        let path = self.path_for(kind);
        match tokio::fs::read(path).await {
            Ok(bytes) if bytes.is_empty() => Ok(ShareCatalog::default()),
            Ok(bytes) => migrate(serde_json::from_slice(&bytes).map_err(ErrorKind::from)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ShareCatalog::default()),
            Err(err) => exn::bail!(ErrorKind::from(err)),
        }
    }

    async fn save(&self, kind: ShareKind, catalog: &ShareCatalog) -> Result<()> {
        let path = self.path_for(kind);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(ErrorKind::from)?;
        }
        let bytes = serde_json::to_vec_pretty(catalog).map_err(ErrorKind::from)?;
        tokio::fs::write(path, bytes).await.map_err(ErrorKind::from)?;
        Ok(())
    }

    /// Append a new entry (`share download`/`share upload`).
    pub async fn add(&self, entry: ShareEntry) -> Result<()> {
        validate_expiry(entry.expiry)?;
        let mut catalog = self.load(entry.kind).await?;
        catalog.entries.push(entry.clone());
        self.save(entry.kind, &catalog).await
    }

    /// `share list`: sweep expired entries (lazy expiry, spec.md §4.7)
    /// then return what remains.
    pub async fn list(&self, kind: ShareKind, now: OffsetDateTime) -> Result<Vec<ShareEntry>> {
        let mut catalog = self.load(kind).await?;
        let before = catalog.entries.len();
        catalog.entries.retain(|entry| !entry.expired_at(now));
        if catalog.entries.len() != before {
            self.save(kind, &catalog).await?;
        }
        Ok(catalog.entries)
    }

    /// `share list` with no kind filter: both catalogs, swept.
    pub async fn list_all(&self, now: OffsetDateTime) -> Result<Vec<ShareEntry>> {
        let mut entries = self.list(ShareKind::Download, now).await?;
        entries.extend(self.list(ShareKind::Upload, now).await?);
        Ok(entries)
    }

    /// `share clear`: drop every entry in both catalogs.
    pub async fn clear(&self) -> Result<()> {
        self.save(ShareKind::Download, &ShareCatalog::default()).await?;
        self.save(ShareKind::Upload, &ShareCatalog::default()).await
    }
}

fn migrate(catalog: ShareCatalog) -> Result<ShareCatalog> {
    // No prior on-disk shape exists yet; this is the seam a future
    // version bump hangs its migration off of.
    Ok(catalog)
}

mod humantime_serde_duration {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, created: OffsetDateTime, expiry_secs: u64) -> ShareEntry {
        ShareEntry {
            key: key.to_string(),
            kind: ShareKind::Download,
            expiry: Duration::from_secs(expiry_secs),
            created,
            artifact: Artifact::Url { href: format!("https://example.com/{key}") },
        }
    }

    #[test]
    fn validate_expiry_bounds() {
        assert!(validate_expiry(Duration::from_secs(0)).is_err());
        assert!(validate_expiry(Duration::from_secs(1)).is_ok());
        assert!(validate_expiry(MAX_EXPIRY).is_ok());
        assert!(validate_expiry(MAX_EXPIRY + Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn list_sweeps_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShareStore::new(dir.path());
        let now = OffsetDateTime::now_utc();
        store.add(entry("fresh", now, 3600)).await.unwrap();
        store.add(entry("stale", now - time::Duration::hours(3), 3600)).await.unwrap();

        let remaining = store.list(ShareKind::Download, now).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].key, "fresh");
    }

    #[tokio::test]
    async fn clear_empties_both_catalogs() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShareStore::new(dir.path());
        let now = OffsetDateTime::now_utc();
        store.add(entry("a", now, 3600)).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.list_all(now).await.unwrap().is_empty());
    }
}
