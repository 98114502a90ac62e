//! The uniform description of an entity returned by any backend
//! (spec.md §3 "Content").

use haul_url::Url;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ContentKind {
    RegularFile,
    Directory,
    Symlink,
    IncompleteUpload,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Content {
    pub url: Url,
    pub modified: OffsetDateTime,
    /// Directory contents carry size 0 (spec.md §3 invariant).
    pub size: u64,
    pub kind: ContentKind,
}
impl Content {
    pub fn directory(url: Url) -> Self {
        Self { url, modified: OffsetDateTime::UNIX_EPOCH, size: 0, kind: ContentKind::Directory }
    }
}
