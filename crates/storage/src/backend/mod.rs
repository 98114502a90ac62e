//! The uniform backend contract (spec.md §4.2) and its two
//! implementations: the filesystem and S3-compatible object storage.

pub mod filesystem;
#[cfg(feature = "s3")]
pub mod s3;
mod seek;

pub use seek::Unseekable;

use crate::content::Content;
use crate::error::Result;
use crate::progress::ProgressTap;
use async_trait::async_trait;
use futures::Stream;
use haul_url::Url;
use std::collections::HashMap;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite};

/// A reader that is both `AsyncRead` and `AsyncSeek`, object-safe so it
/// can back [`BoxAsyncRead`]. Not every source actually supports
/// seeking — see [`Unseekable`], which implements this by failing every
/// seek, for sources (an HTTP object body, a piped stdin) that don't.
pub trait AsyncReadSeek: AsyncRead + AsyncSeek + Send {}
impl<T: AsyncRead + AsyncSeek + Send + ?Sized> AsyncReadSeek for T {}

pub type ContentStream<'a> = Pin<Box<dyn Stream<Item = Result<Content>> + Send + 'a>>;
/// A `Put` source reader. It is always `AsyncSeek` at the type level, but
/// not every backend's `Get` produces a stream that actually supports
/// seeking (see [`Unseekable`]). `put` implementations that want to
/// resume an interrupted write must attempt the seek and fall back to
/// starting over when it fails (spec.md §4.2).
pub type BoxAsyncRead = Pin<Box<dyn AsyncReadSeek + Unpin>>;
pub type BoxAsyncWrite = Pin<Box<dyn AsyncWrite + Send + Unpin>>;
pub type BackendHandle = Arc<dyn Backend + Send + Sync>;

/// Outcome of a same-backend `Copy` attempt.
pub enum CopyOutcome {
    Copied(u64),
    /// Signals the caller to fall back to `Get`+`Put` (different backends,
    /// or an object-storage source larger than the 5 GiB `Copy` ceiling).
    NotSupported,
}

/// A presigned upload form: a POST target plus the fields the client
/// must submit alongside the file (spec.md §4.7).
#[derive(Debug, Clone)]
pub struct UploadForm {
    pub url: String,
    pub fields: HashMap<String, String>,
}

/// Unified interface for storage backends (spec.md §4.2).
///
/// Every backend is bound to a root address at construction time
/// (a local directory, or a bucket with an optional key prefix); all
/// paths passed to its methods are relative to that root. [`Backend::root_url`]
/// recovers the root this backend was built from (`GetURL()` in spec.md).
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// The URL this backend was constructed with (`GetURL()`).
    fn root_url(&self) -> &Url;

    /// `Stat(url)`: metadata for a single relative path, or one of the
    /// closed path/object errors. A directory that has no literal
    /// existence but for which listing its prefix returns at least one
    /// entry MUST still produce a synthetic [`ContentKind::Directory`](crate::ContentKind::Directory).
    async fn stat(&self, path: &Path) -> Result<Content>;

    /// `List(recursive, include_incomplete)`: a lazy, finite,
    /// not-restartable sequence in lexicographic key order (directories
    /// sort as though their name had a trailing separator). Per-entry
    /// errors (broken symlink, permission) are yielded inline without
    /// ending the stream; only a failure to open the root ends the
    /// stream early with one final error item.
    fn list<'a>(&'a self, prefix: Option<&'a Path>, recursive: bool, include_incomplete: bool) -> ContentStream<'a>;

    /// `Get(url)`: a readable byte stream over the object/file contents.
    async fn get(&self, path: &Path) -> Result<BoxAsyncRead>;

    /// `Put(url, stream, size, content_type, progress_tap)`: returns the
    /// written byte count. Filesystem writes land in a sibling
    /// `<name>.part.minio` first, renamed atomically on success (and,
    /// when the reader is seekable, resumed from the partial file's
    /// current size). Object-storage writes multipart above an
    /// implementation threshold.
    async fn put(
        &self,
        path: &Path,
        reader: BoxAsyncRead,
        size: u64,
        content_type: Option<&str>,
        progress: ProgressTap,
    ) -> Result<u64>;

    /// `Copy(source_url, size, progress_tap)`: server-side copy when
    /// `source` addresses the same backend, otherwise
    /// [`CopyOutcome::NotSupported`] so the caller falls back to
    /// `Get`+`Put`. Object storage refuses sources over 5 GiB.
    async fn copy(&self, source: &Url, dest: &Path, size: u64, progress: ProgressTap) -> Result<CopyOutcome>;

    /// `Remove(incomplete?)`.
    async fn remove(&self, path: &Path, incomplete: bool) -> Result<()>;

    /// `MakeBucket(region)`: meaningful only for object storage; a no-op
    /// returning `Ok(())` on the filesystem backend.
    async fn make_bucket(&self, region: Option<&str>) -> Result<()>;

    /// `RemoveBucket(force)`: refuses a non-empty root unless `force`,
    /// in which case every entry under it is removed first (spec.md §6
    /// `rb --force`).
    async fn remove_bucket(&self, force: bool) -> Result<()>;

    async fn get_access(&self) -> Result<crate::access::AccessPolicy>;
    async fn set_access(&self, policy: crate::access::AccessPolicy) -> Result<()>;

    /// `Share(expiry)`: a presigned download URL. Filesystem backend
    /// returns [`crate::error::ErrorKind::APINotImplemented`].
    async fn share_download(&self, path: &Path, expiry: Duration) -> Result<String>;

    /// `ShareUpload(is_recursive, expiry, content_type)`: a presigned
    /// upload form. Filesystem backend returns
    /// [`crate::error::ErrorKind::APINotImplemented`].
    async fn share_upload(
        &self,
        path: &Path,
        is_recursive: bool,
        expiry: Duration,
        content_type: Option<&str>,
    ) -> Result<UploadForm>;
}
