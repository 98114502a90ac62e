//! Filesystem storage backend (spec.md §4.2, §6 "Partial-file convention").
//!
//! All paths passed to this backend are relative to the root it was
//! constructed with; root itself must be an absolute, existing directory.
//! Writes go through a sibling `<name>.part.minio` file so that a crash
//! mid-write never leaves a half-written object under its final name.

use crate::access::AccessPolicy;
use crate::backend::{Backend, BoxAsyncRead, ContentStream, CopyOutcome, UploadForm};
use crate::content::{Content, ContentKind};
use crate::error::{ErrorKind, Result};
use crate::progress::ProgressTap;
use async_stream::stream;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use haul_url::Url;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Suffix used for in-progress uploads (spec.md §6).
pub const PARTIAL_SUFFIX: &str = ".part.minio";

#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    name: String,
    root_url: Url,
    root: PathBuf,
}

impl FilesystemBackend {
    pub fn new(name: impl Into<String>, root_url: Url, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::PathInsufficientPermission(format!("root must be absolute: {}", root.display())));
        }
        Ok(Self { name: name.into(), root_url, root: root.to_path_buf() })
    }

    /// Join a relative path onto the root, rejecting any attempt to
    /// traverse outside of it.
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let mut components = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(s) => components.push(s),
                Component::CurDir | Component::RootDir => {},
                Component::Prefix(_) => {
                    exn::bail!(ErrorKind::PathNotFound(path.display().to_string()));
                },
                Component::ParentDir => {
                    if components.pop().is_none() {
                        exn::bail!(ErrorKind::PathNotFound(path.display().to_string()));
                    }
                },
            }
        }
        Ok(components.into_iter().fold(self.root.clone(), |mut acc, c| {
            acc.push(c);
            acc
        }))
    }

    fn partial_path(target: &Path) -> PathBuf {
        let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(PARTIAL_SUFFIX);
        target.with_file_name(name)
    }

    fn io_error_kind(path: &Path, err: &io::Error) -> ErrorKind {
        match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::PathNotFound(path.display().to_string()),
            io::ErrorKind::PermissionDenied => ErrorKind::PathInsufficientPermission(path.display().to_string()),
            _ => ErrorKind::Io(io::Error::new(err.kind(), err.to_string())),
        }
    }

    async fn stat_absolute(&self, absolute: &Path, url: Url) -> Result<Content> {
        let metadata = match fs::symlink_metadata(absolute).await {
            Ok(m) => m,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                // No literal entry, but `List` against this as a prefix might
                // still find children — the caller (backend::list) decides
                // whether to synthesize a directory Content (spec.md §4.2).
                exn::bail!(ErrorKind::PathNotFound(absolute.display().to_string()));
            },
            Err(err) => exn::bail!(Self::io_error_kind(absolute, &err)),
        };
        if metadata.is_symlink() {
            return match fs::metadata(absolute).await {
                Ok(target_meta) => Ok(Content {
                    url,
                    modified: modified_of(&target_meta),
                    size: target_meta.len(),
                    kind: ContentKind::Symlink,
                }),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    exn::bail!(ErrorKind::BrokenSymlink(absolute.display().to_string()));
                },
                Err(err) if matches!(err.raw_os_error(), Some(40)) => {
                    // ELOOP
                    exn::bail!(ErrorKind::TooManyLevelsSymlink(absolute.display().to_string()));
                },
                Err(err) => exn::bail!(Self::io_error_kind(absolute, &err)),
            };
        }
        let kind = if metadata.is_dir() {
            ContentKind::Directory
        } else if absolute.as_os_str().to_string_lossy().ends_with(PARTIAL_SUFFIX) {
            ContentKind::IncompleteUpload
        } else {
            ContentKind::RegularFile
        };
        let size = if kind == ContentKind::Directory { 0 } else { metadata.len() };
        Ok(Content { url, modified: modified_of(&metadata), size, kind })
    }
}

fn modified_of(metadata: &std::fs::Metadata) -> OffsetDateTime {
    metadata.modified().map(OffsetDateTime::from).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

#[async_trait]
impl Backend for FilesystemBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn root_url(&self) -> &Url {
        &self.root_url
    }

    async fn stat(&self, path: &Path) -> Result<Content> {
        let absolute = self.resolve(path)?;
        let url = self.root_url.join(&path.to_string_lossy())?;
        match self.stat_absolute(&absolute, url.clone()).await {
            Ok(content) => Ok(content),
            // No literal entry at this path — but if listing it as a
            // prefix would turn up at least one child, it's a directory
            // in everything but name (spec.md §4.2).
            Err(err) if matches!(&*err, ErrorKind::PathNotFound(_)) => match fs::read_dir(&absolute).await {
                Ok(mut read_dir) if read_dir.next_entry().await.ok().flatten().is_some() => {
                    Ok(Content::directory(url))
                },
                _ => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    fn list<'a>(&'a self, prefix: Option<&'a Path>, recursive: bool, include_incomplete: bool) -> ContentStream<'a> {
        let root = self.root.clone();
        let root_url = self.root_url.clone();
        let prefix_rel = prefix.map(|p| p.to_path_buf()).unwrap_or_default();
        Box::pin(stream! {
            let start = root.join(&prefix_rel);
            let mut entries: Vec<(PathBuf, PathBuf, bool)> = Vec::new();
            if let Err(err) = collect(&start, &prefix_rel, recursive, include_incomplete, &mut entries).await {
                yield Err(exn::Exn::new(Self::io_error_kind(&start, &err)));
                return;
            }
            entries.sort_by(|a, b| sort_key(&a.1, a.2).cmp(&sort_key(&b.1, b.2)));
            for (absolute, relative, _is_dir) in entries {
                let url = match root_url.join(&relative.to_string_lossy()) {
                    Ok(u) => u,
                    Err(err) => { yield Err(err); continue; },
                };
                let metadata = match fs::symlink_metadata(&absolute).await {
                    Ok(m) => m,
                    Err(err) => { yield Err(exn::Exn::new(Self::io_error_kind(&absolute, &err))); continue; },
                };
                if metadata.is_symlink() {
                    match fs::metadata(&absolute).await {
                        Ok(m) => yield Ok(Content { url, modified: modified_of(&m), size: m.len(), kind: ContentKind::Symlink }),
                        Err(_) => yield Err(exn::Exn::new(ErrorKind::BrokenSymlink(absolute.display().to_string()))),
                    }
                    continue;
                }
                let is_partial = absolute.to_string_lossy().ends_with(PARTIAL_SUFFIX);
                let kind = if metadata.is_dir() {
                    ContentKind::Directory
                } else if is_partial {
                    ContentKind::IncompleteUpload
                } else {
                    ContentKind::RegularFile
                };
                let size = if kind == ContentKind::Directory { 0 } else { metadata.len() };
                yield Ok(Content { url, modified: modified_of(&metadata), size, kind });
            }
        })
    }

    async fn get(&self, path: &Path) -> Result<BoxAsyncRead> {
        let absolute = self.resolve(path)?;
        let file = fs::File::open(&absolute).await.map_err(|err| Self::io_error_kind(&absolute, &err))?;
        Ok(Box::pin(file))
    }

    async fn put(
        &self,
        path: &Path,
        mut reader: BoxAsyncRead,
        size: u64,
        _content_type: Option<&str>,
        progress: ProgressTap,
    ) -> Result<u64> {
        use tokio::io::{AsyncReadExt, AsyncSeekExt};

        let absolute = self.resolve(path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await.map_err(|err| Self::io_error_kind(parent, &err))?;
        }
        let partial = Self::partial_path(&absolute);

        // Resume support (spec.md §4.2): if a partial file already exists
        // and `reader` exposes random access, seek both it and the
        // partial to the partial's current length and append from there.
        // If the reader fails the seek (e.g. an HTTP body or piped
        // stdin, wrapped in `Unseekable`), fall back to starting over.
        let existing_len = fs::metadata(&partial).await.map(|m| m.len()).unwrap_or(0);
        let (mut file, mut written) = if existing_len > 0 && reader.seek(io::SeekFrom::Start(existing_len)).await.is_ok() {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .open(&partial)
                .await
                .or_raise(|| ErrorKind::BackendError(partial.display().to_string()))?;
            file.seek(io::SeekFrom::Start(existing_len)).await.map_err(ErrorKind::from)?;
            (file, existing_len)
        } else {
            let file =
                fs::File::create(&partial).await.or_raise(|| ErrorKind::BackendError(partial.display().to_string()))?;
            (file, 0)
        };
        progress.add(written);

        let mut buf = vec![0u8; 256 * 1024];
        loop {
            let n = reader.read(&mut buf).await.map_err(ErrorKind::from)?;
            if n == 0 {
                break;
            }
            written += n as u64;
            if written > size {
                let _ = fs::remove_file(&partial).await;
                exn::bail!(ErrorKind::UnexpectedExcessRead);
            }
            file.write_all(&buf[..n]).await.map_err(ErrorKind::from)?;
            progress.add(n as u64);
        }
        file.flush().await.map_err(ErrorKind::from)?;
        drop(file);
        if written < size {
            exn::bail!(ErrorKind::UnexpectedEOF);
        }
        fs::rename(&partial, &absolute).await.or_raise(|| ErrorKind::BackendError(absolute.display().to_string()))?;
        Ok(written)
    }

    async fn copy(&self, source: &Url, dest: &Path, size: u64, progress: ProgressTap) -> Result<CopyOutcome> {
        if source.scheme != haul_url::Scheme::File {
            return Ok(CopyOutcome::NotSupported);
        }
        let src_path = PathBuf::from(&source.path);
        let dest_absolute = self.resolve(dest)?;
        if let Some(parent) = dest_absolute.parent() {
            fs::create_dir_all(parent).await.map_err(|err| Self::io_error_kind(parent, &err))?;
        }
        let copied = fs::copy(&src_path, &dest_absolute).await.map_err(|err| Self::io_error_kind(&src_path, &err))?;
        progress.add(copied);
        let _ = size;
        Ok(CopyOutcome::Copied(copied))
    }

    async fn remove(&self, path: &Path, incomplete: bool) -> Result<()> {
        let absolute = self.resolve(path)?;
        let target = if incomplete { Self::partial_path(&absolute) } else { absolute };
        fs::remove_file(&target).await.map_err(|err| Self::io_error_kind(&target, &err))?;
        Ok(())
    }

    async fn make_bucket(&self, _region: Option<&str>) -> Result<()> {
        fs::create_dir_all(&self.root).await.map_err(|err| Self::io_error_kind(&self.root, &err))?;
        Ok(())
    }

    async fn remove_bucket(&self, force: bool) -> Result<()> {
        if force {
            fs::remove_dir_all(&self.root).await.map_err(|err| Self::io_error_kind(&self.root, &err))?;
            return Ok(());
        }
        match fs::remove_dir(&self.root).await {
            Ok(()) => Ok(()),
            Err(err) if err.raw_os_error() == Some(39) /* ENOTEMPTY */ => {
                exn::bail!(ErrorKind::BucketNotEmpty(self.root.display().to_string()));
            },
            Err(err) => exn::bail!(Self::io_error_kind(&self.root, &err)),
        }
    }

    async fn get_access(&self) -> Result<AccessPolicy> {
        let metadata = fs::metadata(&self.root).await.map_err(|err| Self::io_error_kind(&self.root, &err))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            Ok(AccessPolicy::from_posix_mode(metadata.permissions().mode()))
        }
        #[cfg(not(unix))]
        {
            let _ = metadata;
            Ok(AccessPolicy::ReadWrite)
        }
    }

    async fn set_access(&self, policy: AccessPolicy) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(policy.to_posix_mode());
            fs::set_permissions(&self.root, permissions).await.map_err(|err| Self::io_error_kind(&self.root, &err))?;
            Ok(())
        }
        #[cfg(not(unix))]
        {
            let _ = policy;
            exn::bail!(ErrorKind::APINotImplemented);
        }
    }

    async fn share_download(&self, _path: &Path, _expiry: Duration) -> Result<String> {
        exn::bail!(ErrorKind::APINotImplemented);
    }

    async fn share_upload(
        &self,
        _path: &Path,
        _is_recursive: bool,
        _expiry: Duration,
        _content_type: Option<&str>,
    ) -> Result<UploadForm> {
        exn::bail!(ErrorKind::APINotImplemented);
    }
}

/// Sort key making directories compare as though their name carried a
/// trailing separator (spec.md §4.2 "List" ordering).
fn sort_key(relative: &Path, is_dir: bool) -> String {
    let mut key = relative.to_string_lossy().into_owned();
    if is_dir {
        key.push('/');
    }
    key
}

/// Recursively collect `(absolute, relative, is_dir)` triples under `start`.
/// Implemented eagerly (not as a generator) for simplicity; the outer
/// stream still emits lazily, one `Content` per iteration.
fn collect<'a>(
    absolute_dir: &'a Path,
    relative_dir: &'a Path,
    recursive: bool,
    include_incomplete: bool,
    out: &'a mut Vec<(PathBuf, PathBuf, bool)>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = io::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut read_dir = fs::read_dir(absolute_dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            let absolute = entry.path();
            let relative = relative_dir.join(entry.file_name());
            let name = entry.file_name().to_string_lossy().into_owned();
            if !include_incomplete && name.ends_with(PARTIAL_SUFFIX) {
                continue;
            }
            if file_type.is_dir() {
                if recursive {
                    collect(&absolute, &relative, recursive, include_incomplete, out).await?;
                } else {
                    out.push((absolute, relative, true));
                }
            } else {
                out.push((absolute, relative, false));
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn backend_at(root: &Path) -> FilesystemBackend {
        let root_url = Url::parse_file(root).unwrap();
        FilesystemBackend::new("local", root_url, root).unwrap()
    }

    #[tokio::test]
    async fn put_then_get_roundtrips_bytes() {
        let dir = tempdir().unwrap();
        let backend = backend_at(dir.path());
        let payload = b"hello world".to_vec();
        let reader: BoxAsyncRead = Box::pin(std::io::Cursor::new(payload.clone()));
        let written = backend
            .put(Path::new("a.txt"), reader, payload.len() as u64, None, Arc::new(crate::progress::NullProgress))
            .await
            .unwrap();
        assert_eq!(written, payload.len() as u64);
        assert!(!dir.path().join(format!("a.txt{PARTIAL_SUFFIX}")).exists());

        let mut got = Vec::new();
        let mut reader = backend.get(Path::new("a.txt")).await.unwrap();
        use tokio::io::AsyncReadExt;
        reader.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, payload);
    }

    #[tokio::test]
    async fn put_short_of_declared_size_fails_and_leaves_no_final_file() {
        let dir = tempdir().unwrap();
        let backend = backend_at(dir.path());
        let reader: BoxAsyncRead = Box::pin(std::io::Cursor::new(b"abc".to_vec()));
        let err = backend.put(Path::new("short.bin"), reader, 10, None, Arc::new(crate::progress::NullProgress)).await;
        assert!(matches!(err, Err(e) if matches!(&*e, ErrorKind::UnexpectedEOF)));
        assert!(!dir.path().join("short.bin").exists());
    }

    #[tokio::test]
    async fn put_exceeding_declared_size_fails_with_excess_read() {
        let dir = tempdir().unwrap();
        let backend = backend_at(dir.path());
        let reader: BoxAsyncRead = Box::pin(std::io::Cursor::new(b"abcdefgh".to_vec()));
        let err = backend.put(Path::new("long.bin"), reader, 3, None, Arc::new(crate::progress::NullProgress)).await;
        assert!(matches!(err, Err(e) if matches!(&*e, ErrorKind::UnexpectedExcessRead)));
        assert!(!dir.path().join(format!("long.bin{PARTIAL_SUFFIX}")).exists());
    }

    #[tokio::test]
    async fn put_resumes_from_existing_partial_when_reader_is_seekable() {
        let dir = tempdir().unwrap();
        let backend = backend_at(dir.path());
        let payload = b"hello resumable world".to_vec();
        let partial = dir.path().join(format!("r.bin{PARTIAL_SUFFIX}"));
        tokio::fs::write(&partial, &payload[..5]).await.unwrap();

        let reader: BoxAsyncRead = Box::pin(std::io::Cursor::new(payload.clone()));
        let written = backend
            .put(Path::new("r.bin"), reader, payload.len() as u64, None, Arc::new(crate::progress::NullProgress))
            .await
            .unwrap();
        assert_eq!(written, payload.len() as u64);

        let mut got = Vec::new();
        let mut reader = backend.get(Path::new("r.bin")).await.unwrap();
        use tokio::io::AsyncReadExt;
        reader.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, payload);
    }

    #[tokio::test]
    async fn put_restarts_from_scratch_when_reader_is_unseekable() {
        let dir = tempdir().unwrap();
        let backend = backend_at(dir.path());
        let payload = b"hello unseekable world".to_vec();
        let partial = dir.path().join(format!("u.bin{PARTIAL_SUFFIX}"));
        tokio::fs::write(&partial, b"stale partial content").await.unwrap();

        let reader: BoxAsyncRead = Box::pin(crate::backend::Unseekable::new(std::io::Cursor::new(payload.clone())));
        let written = backend
            .put(Path::new("u.bin"), reader, payload.len() as u64, None, Arc::new(crate::progress::NullProgress))
            .await
            .unwrap();
        assert_eq!(written, payload.len() as u64);

        let mut got = Vec::new();
        let mut reader = backend.get(Path::new("u.bin")).await.unwrap();
        use tokio::io::AsyncReadExt;
        reader.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, payload);
    }

    #[tokio::test]
    async fn list_orders_directories_as_if_trailing_separator() {
        // "a" is a directory; as a bare key it would sort between
        // "a-sibling" and "a.txt" ('-' < '.'), but with the trailing
        // separator the spec requires it sorts *after* both.
        let dir = tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join("a-sibling")).await.unwrap();
        tokio::fs::write(dir.path().join("a.txt"), b"x").await.unwrap();
        tokio::fs::create_dir(dir.path().join("a")).await.unwrap();
        tokio::fs::write(dir.path().join("a").join("child"), b"y").await.unwrap();

        let backend = backend_at(dir.path());
        let mut stream = backend.list(None, false, false);
        let mut names = Vec::new();
        while let Some(entry) = stream.next().await {
            let content = entry.unwrap();
            names.push(content.url.basename().to_string());
        }
        assert_eq!(names, vec!["a-sibling", "a.txt", "a"]);
    }

    #[tokio::test]
    async fn resolve_rejects_parent_dir_escape() {
        let dir = tempdir().unwrap();
        let backend = backend_at(dir.path());
        let err = backend.get(Path::new("../../etc/passwd")).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn stat_synthesizes_directory_for_prefix_with_no_literal_entry() {
        let dir = tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("d")).await.unwrap();
        tokio::fs::write(dir.path().join("d").join("f"), b"x").await.unwrap();
        let backend = backend_at(dir.path());
        let content = backend.stat(Path::new("d")).await.unwrap();
        assert_eq!(content.kind, ContentKind::Directory);
        assert_eq!(content.size, 0);
    }

    #[tokio::test]
    async fn remove_bucket_without_force_refuses_non_empty_root() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("f"), b"x").await.unwrap();
        let backend = backend_at(dir.path());
        let err = backend.remove_bucket(false).await;
        assert!(matches!(err, Err(e) if matches!(&*e, ErrorKind::BucketNotEmpty(_))));
        assert!(dir.path().exists());
    }
}
