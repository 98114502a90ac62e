//! S3-compatible object-storage backend (spec.md §4.2, §6).
//!
//! Covers AWS S3 and compatible services (MinIO, Backblaze B2, Tigris) via
//! the same client, selected only by endpoint/region/signature version in
//! configuration. Bucket/key decomposition and virtual-host normalization
//! are handled upstream by [`haul_url::Url`]; this module only ever sees
//! the canonical `/<bucket>/<key>` path-style shape.

use crate::access::AccessPolicy;
use crate::backend::{Backend, BoxAsyncRead, ContentStream, CopyOutcome, UploadForm};
use crate::content::{Content, ContentKind};
use crate::error::{ErrorKind, Result};
use crate::progress::ProgressTap;
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region, retry::RetryConfig};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use exn::{OptionExt, ResultExt};
use haul_url::Url;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::io::AsyncReadExt;

/// Above this size, `Put` switches to multipart upload.
const MULTIPART_THRESHOLD: u64 = 64 * 1024 * 1024;
/// Part size used for multipart uploads.
const MULTIPART_PART_SIZE: u64 = 16 * 1024 * 1024;
/// `Copy` is only attempted when the source is no larger than this
/// (spec.md §4.2, §6).
const COPY_SIZE_CEILING: u64 = 5 * 1024 * 1024 * 1024;

#[derive(Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    key_prefix: String,
    root_url: Url,
}

impl S3Backend {
    pub async fn new(
        name: impl Into<String>,
        root_url: Url,
        bucket: impl Into<String>,
        key_prefix: impl Into<String>,
        region: impl Into<String>,
        endpoint: Option<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        path_style: bool,
    ) -> Result<Self> {
        let client = Self::build_client(region, endpoint, access_key, secret_key, path_style);
        Ok(Self::from_client(name, client, root_url, bucket, key_prefix))
    }

    /// Builds the underlying SDK client alone, so callers that cache it by
    /// host+credentials (spec.md §5) can construct a fresh,
    /// prefix-bound [`S3Backend`] from the same client per address via
    /// [`Self::from_client`] without re-dialing.
    pub fn build_client(
        region: impl Into<String>,
        endpoint: Option<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        path_style: bool,
    ) -> Client {
        let credentials = Credentials::new(access_key.into(), secret_key.into(), None, None, "haul-config");
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            .force_path_style(path_style);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Client::from_conf(builder.build())
    }

    /// Builds a backend bound to `bucket`/`key_prefix` from an
    /// already-constructed client, so the same client (and its
    /// connection pool) can back multiple addresses in the same bucket
    /// that differ only by key prefix.
    pub fn from_client(
        name: impl Into<String>,
        client: Client,
        root_url: Url,
        bucket: impl Into<String>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            bucket: bucket.into(),
            key_prefix: key_prefix.into().trim_matches('/').to_string(),
            root_url,
        }
    }

    fn full_key(&self, path: &Path) -> String {
        let relative = path.to_string_lossy().replace('\\', "/");
        let relative = relative.trim_matches('/');
        if self.key_prefix.is_empty() {
            relative.to_string()
        } else if relative.is_empty() {
            self.key_prefix.clone()
        } else {
            format!("{}/{}", self.key_prefix, relative)
        }
    }

    fn relative_from_key<'k>(&self, key: &'k str) -> &'k str {
        let trimmed = if self.key_prefix.is_empty() {
            key
        } else {
            key.strip_prefix(&self.key_prefix).and_then(|s| s.strip_prefix('/')).unwrap_or(key)
        };
        trimmed.trim_start_matches('/')
    }

    fn url_for_key(&self, key: &str) -> Result<Url> {
        self.root_url.join(self.relative_from_key(key))
    }

    fn parse_datetime(dt: &aws_sdk_s3::primitives::DateTime) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos()).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }
}

#[async_trait]
impl Backend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn root_url(&self) -> &Url {
        &self.root_url
    }

    async fn stat(&self, path: &Path) -> Result<Content> {
        if self.bucket.is_empty() {
            exn::bail!(ErrorKind::BucketNameEmpty);
        }
        let key = self.full_key(path);
        match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(response) => {
                let url = self.url_for_key(&key)?;
                let size = response.content_length.unwrap_or(0).max(0) as u64;
                let modified = response.last_modified.as_ref().map(Self::parse_datetime).unwrap_or(OffsetDateTime::UNIX_EPOCH);
                let kind = if key.ends_with(crate::backend::filesystem::PARTIAL_SUFFIX) {
                    ContentKind::IncompleteUpload
                } else {
                    ContentKind::RegularFile
                };
                Ok(Content { url, modified, size, kind })
            },
            Err(SdkError::ServiceError(e)) if matches!(e.err(), HeadObjectError::NotFound(_)) => {
                // No literal object at this key. If listing it as a prefix
                // turns up at least one entry, it's a synthetic directory.
                let listing = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(format!("{}/", key.trim_end_matches('/')))
                    .max_keys(1)
                    .send()
                    .await
                    .or_raise(|| ErrorKind::BackendError("list-for-stat failed".to_string()))?;
                if listing.contents().is_empty() && listing.common_prefixes().is_empty() {
                    exn::bail!(ErrorKind::PathNotFound(path.display().to_string()));
                }
                Ok(Content::directory(self.url_for_key(&key)?))
            },
            Err(e) => Err(map_error(e, path)),
        }
    }

    fn list<'a>(&'a self, prefix: Option<&'a Path>, recursive: bool, include_incomplete: bool) -> ContentStream<'a> {
        let key_prefix = prefix.map(|p| self.full_key(p)).unwrap_or_else(|| self.key_prefix.clone());
        let list_prefix = if key_prefix.is_empty() { String::new() } else { format!("{}/", key_prefix.trim_end_matches('/')) };
        let delimiter = if recursive { None } else { Some("/".to_string()) };
        Box::pin(stream! {
            if self.bucket.is_empty() {
                yield Err(exn::Exn::new(ErrorKind::BucketNameEmpty));
                return;
            }
            let mut continuation: Option<String> = None;
            loop {
                let mut req = self.client.list_objects_v2().bucket(&self.bucket).prefix(&list_prefix);
                if let Some(delim) = &delimiter {
                    req = req.delimiter(delim);
                }
                if let Some(token) = &continuation {
                    req = req.continuation_token(token);
                }
                let page = match req.send().await {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(map_error(e, Path::new(&list_prefix)));
                        return;
                    },
                };
                for common in page.common_prefixes() {
                    if let Some(p) = common.prefix() {
                        match self.url_for_key(p) {
                            Ok(url) => yield Ok(Content::directory(url)),
                            Err(err) => yield Err(err),
                        }
                    }
                }
                for object in page.contents() {
                    let Some(key) = object.key() else { continue };
                    if !include_incomplete && key.ends_with(crate::backend::filesystem::PARTIAL_SUFFIX) {
                        continue;
                    }
                    let url = match self.url_for_key(key) {
                        Ok(url) => url,
                        Err(err) => { yield Err(err); continue; },
                    };
                    let size = object.size().unwrap_or(0).max(0) as u64;
                    let modified = object.last_modified().map(Self::parse_datetime).unwrap_or(OffsetDateTime::UNIX_EPOCH);
                    let kind = if key.ends_with(crate::backend::filesystem::PARTIAL_SUFFIX) {
                        ContentKind::IncompleteUpload
                    } else if key.ends_with('/') {
                        ContentKind::Directory
                    } else {
                        ContentKind::RegularFile
                    };
                    yield Ok(Content { url, modified, size, kind });
                }
                if page.is_truncated().unwrap_or(false) {
                    continuation = page.next_continuation_token().map(|s| s.to_string());
                } else {
                    break;
                }
            }
        })
    }

    async fn get(&self, path: &Path) -> Result<BoxAsyncRead> {
        let key = self.full_key(path);
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| map_get_error(e, path))?;
        let reader = response.body.into_async_read();
        Ok(Box::pin(crate::backend::Unseekable::new(reader)))
    }

    async fn put(
        &self,
        path: &Path,
        mut reader: BoxAsyncRead,
        size: u64,
        content_type: Option<&str>,
        progress: ProgressTap,
    ) -> Result<u64> {
        let key = self.full_key(path);
        if size > MULTIPART_THRESHOLD {
            return self.put_multipart(&key, reader, size, content_type, progress).await;
        }
        let mut buf = Vec::with_capacity(size as usize);
        reader.read_to_end(&mut buf).await.map_err(ErrorKind::from)?;
        if (buf.len() as u64) < size {
            exn::bail!(ErrorKind::UnexpectedEOF);
        }
        if (buf.len() as u64) > size {
            exn::bail!(ErrorKind::UnexpectedExcessRead);
        }
        let written = buf.len() as u64;
        let mut req = self.client.put_object().bucket(&self.bucket).key(&key).body(ByteStream::from(buf));
        if let Some(ct) = content_type {
            req = req.content_type(ct);
        }
        req.send().await.map_err(|e| map_write_error(e))?;
        progress.add(written);
        Ok(written)
    }

    async fn copy(&self, source: &Url, dest: &Path, size: u64, progress: ProgressTap) -> Result<CopyOutcome> {
        if !source.scheme.is_object_storage() || size > COPY_SIZE_CEILING {
            return Ok(CopyOutcome::NotSupported);
        }
        let Some((source_bucket, source_key)) = source.bucket_and_key() else {
            return Ok(CopyOutcome::NotSupported);
        };
        let dest_key = self.full_key(dest);
        let copy_source = format!("{source_bucket}/{source_key}");
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(&copy_source)
            .key(&dest_key)
            .send()
            .await
            .or_raise(|| ErrorKind::BackendError(format!("copy {copy_source} -> {dest_key}")))?;
        progress.add(size);
        Ok(CopyOutcome::Copied(size))
    }

    async fn remove(&self, path: &Path, incomplete: bool) -> Result<()> {
        let key = self.full_key(path);
        if incomplete {
            let listing = self
                .client
                .list_multipart_uploads()
                .bucket(&self.bucket)
                .prefix(&key)
                .send()
                .await
                .or_raise(|| ErrorKind::BackendError("list-multipart-uploads failed".to_string()))?;
            for upload in listing.uploads() {
                if let (Some(upload_key), Some(upload_id)) = (upload.key(), upload.upload_id()) {
                    self.client
                        .abort_multipart_upload()
                        .bucket(&self.bucket)
                        .key(upload_key)
                        .upload_id(upload_id)
                        .send()
                        .await
                        .or_raise(|| ErrorKind::BackendError("abort-multipart-upload failed".to_string()))?;
                }
            }
            return Ok(());
        }
        // DeleteObject is idempotent and reports success for a missing key,
        // so a plain existence check comes first: the filesystem backend
        // raises on a missing target via `NotFound`, and the CLI's
        // `--force` suppression (spec.md §8) depends on `remove` doing the
        // same here.
        match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(_) => {},
            Err(SdkError::ServiceError(e)) if matches!(e.err(), HeadObjectError::NotFound(_)) => {
                exn::bail!(ErrorKind::ObjectMissing(path.display().to_string()));
            },
            Err(e) => return Err(map_error(e, path)),
        }
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => ErrorKind::Network(e.to_string()),
                _ => ErrorKind::BackendError(e.to_string()),
            })?;
        Ok(())
    }

    async fn make_bucket(&self, region: Option<&str>) -> Result<()> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => return Ok(()),
            Err(SdkError::ServiceError(e)) if matches!(e.err(), HeadBucketError::NotFound(_)) => {},
            Err(_) => {},
        }
        let mut req = self.client.create_bucket().bucket(&self.bucket);
        if let Some(region) = region {
            use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
            req = req.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        match req.send().await {
            Ok(_) => Ok(()),
            Err(e) if e.raw_response().is_some() && e.code() == Some("BucketAlreadyOwnedByYou") => Ok(()),
            Err(e) => Err(ErrorKind::BackendError(e.to_string()).into()),
        }
    }

    async fn remove_bucket(&self, force: bool) -> Result<()> {
        if force {
            let mut continuation: Option<String> = None;
            loop {
                let mut req = self.client.list_objects_v2().bucket(&self.bucket);
                if let Some(token) = &continuation {
                    req = req.continuation_token(token);
                }
                let page =
                    req.send().await.or_raise(|| ErrorKind::BackendError("list-objects-v2 failed".to_string()))?;
                for object in page.contents() {
                    if let Some(key) = object.key() {
                        self.client
                            .delete_object()
                            .bucket(&self.bucket)
                            .key(key)
                            .send()
                            .await
                            .or_raise(|| ErrorKind::BackendError(format!("delete-object {key} failed")))?;
                    }
                }
                if page.is_truncated().unwrap_or(false) {
                    continuation = page.next_continuation_token().map(|s| s.to_string());
                } else {
                    break;
                }
            }
        } else {
            let listing = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .max_keys(1)
                .send()
                .await
                .or_raise(|| ErrorKind::BackendError("list-objects-v2 failed".to_string()))?;
            if !listing.contents().is_empty() {
                exn::bail!(ErrorKind::BucketNotEmpty(self.bucket.clone()));
            }
        }
        self.client
            .delete_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .or_raise(|| ErrorKind::BackendError("delete-bucket failed".to_string()))?;
        Ok(())
    }

    async fn get_access(&self) -> Result<AccessPolicy> {
        match self.client.get_bucket_policy().bucket(&self.bucket).send().await {
            Ok(response) => {
                let policy = response.policy().unwrap_or("");
                Ok(classify_policy(policy))
            },
            Err(SdkError::ServiceError(e)) if e.raw().status().as_u16() == 404 => Ok(AccessPolicy::None),
            Err(e) => Err(ErrorKind::BackendError(e.to_string()).into()),
        }
    }

    async fn set_access(&self, policy: AccessPolicy) -> Result<()> {
        if policy == AccessPolicy::None {
            let _ = self.client.delete_bucket_policy().bucket(&self.bucket).send().await;
            return Ok(());
        }
        let document = policy_document(&self.bucket, policy);
        self.client
            .put_bucket_policy()
            .bucket(&self.bucket)
            .policy(document)
            .send()
            .await
            .or_raise(|| ErrorKind::BackendError("put-bucket-policy failed".to_string()))?;
        Ok(())
    }

    async fn share_download(&self, path: &Path, expiry: Duration) -> Result<String> {
        let key = self.full_key(path);
        let presign_config =
            PresigningConfig::expires_in(expiry).or_raise(|| ErrorKind::BackendError("invalid presign expiry".to_string()))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presign_config)
            .await
            .or_raise(|| ErrorKind::BackendError("presign get-object failed".to_string()))?;
        Ok(presigned.uri().to_string())
    }

    async fn share_upload(
        &self,
        path: &Path,
        is_recursive: bool,
        expiry: Duration,
        content_type: Option<&str>,
    ) -> Result<UploadForm> {
        let key = if is_recursive { format!("{}/${{key}}", self.full_key(path).trim_end_matches('/')) } else { self.full_key(path) };
        let presign_config =
            PresigningConfig::expires_in(expiry).or_raise(|| ErrorKind::BackendError("invalid presign expiry".to_string()))?;
        let mut req = self.client.put_object().bucket(&self.bucket).key(&key);
        if let Some(ct) = content_type {
            req = req.content_type(ct);
        }
        let presigned =
            req.presigned(presign_config).await.or_raise(|| ErrorKind::BackendError("presign put-object failed".to_string()))?;
        let mut fields = HashMap::new();
        for (name, value) in presigned.headers() {
            fields.insert(name.to_string(), value.to_string());
        }
        Ok(UploadForm { url: presigned.uri().to_string(), fields })
    }
}

impl S3Backend {
    async fn put_multipart(
        &self,
        key: &str,
        mut reader: BoxAsyncRead,
        size: u64,
        content_type: Option<&str>,
        progress: ProgressTap,
    ) -> Result<u64> {
        let mut create = self.client.create_multipart_upload().bucket(&self.bucket).key(key);
        if let Some(ct) = content_type {
            create = create.content_type(ct);
        }
        let created = create.send().await.or_raise(|| ErrorKind::BackendError("create-multipart-upload failed".to_string()))?;
        let upload_id = created.upload_id().ok_or_raise(|| ErrorKind::BackendError("missing upload id".to_string()))?;

        let mut parts = Vec::new();
        let mut part_number = 1i32;
        let mut total_written: u64 = 0;
        let mut buf = vec![0u8; MULTIPART_PART_SIZE as usize];
        loop {
            let n = read_full(&mut reader, &mut buf).await.map_err(ErrorKind::from)?;
            if n == 0 {
                break;
            }
            total_written += n as u64;
            if total_written > size {
                let _ = self.abort(key, upload_id).await;
                exn::bail!(ErrorKind::UnexpectedExcessRead);
            }
            let uploaded = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(buf[..n].to_vec()))
                .send()
                .await;
            let uploaded = match uploaded {
                Ok(u) => u,
                Err(e) => {
                    let _ = self.abort(key, upload_id).await;
                    exn::bail!(ErrorKind::BackendError(e.to_string()));
                },
            };
            parts.push(CompletedPart::builder().part_number(part_number).set_e_tag(uploaded.e_tag().map(str::to_string)).build());
            progress.add(n as u64);
            part_number += 1;
            if n < buf.len() {
                break;
            }
        }
        if total_written < size {
            let _ = self.abort(key, upload_id).await;
            exn::bail!(ErrorKind::UnexpectedEOF);
        }
        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(parts)).build())
            .send()
            .await
            .or_raise(|| ErrorKind::BackendError("complete-multipart-upload failed".to_string()))?;
        Ok(total_written)
    }

    async fn abort(&self, key: &str, upload_id: &str) {
        let _ = self.client.abort_multipart_upload().bucket(&self.bucket).key(key).upload_id(upload_id).send().await;
    }
}

/// Read until `buf` is full or the stream ends (a plain `.read()` may
/// return short reads well before EOF).
async fn read_full(reader: &mut BoxAsyncRead, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn map_error<E: std::fmt::Display>(e: SdkError<E>, path: &Path) -> exn::Exn<ErrorKind> {
    match &e {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => exn::Exn::new(ErrorKind::Network(e.to_string())),
        _ => exn::Exn::new(ErrorKind::BackendError(format!("{}: {e}", path.display()))),
    }
}

fn map_get_error(e: SdkError<GetObjectError>, path: &Path) -> exn::Exn<ErrorKind> {
    match &e {
        SdkError::ServiceError(s) if matches!(s.err(), GetObjectError::NoSuchKey(_)) => {
            exn::Exn::new(ErrorKind::ObjectMissing(path.display().to_string()))
        },
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => exn::Exn::new(ErrorKind::Network(e.to_string())),
        _ => exn::Exn::new(ErrorKind::BackendError(e.to_string())),
    }
}

fn map_write_error<E: std::fmt::Display>(e: SdkError<E>) -> exn::Exn<ErrorKind> {
    match &e {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => exn::Exn::new(ErrorKind::Network(e.to_string())),
        _ => exn::Exn::new(ErrorKind::BackendError(e.to_string())),
    }
}

/// Collapse a bucket policy document into one of the four coarse
/// policies the core exposes (spec.md §4.2 `GetAccess`).
fn classify_policy(document: &str) -> AccessPolicy {
    let allows_get = document.contains("\"s3:GetObject\"");
    let allows_put = document.contains("\"s3:PutObject\"");
    match (allows_get, allows_put) {
        (true, true) => AccessPolicy::ReadWrite,
        (true, false) => AccessPolicy::ReadOnly,
        (false, true) => AccessPolicy::WriteOnly,
        (false, false) => AccessPolicy::None,
    }
}

fn policy_document(bucket: &str, policy: AccessPolicy) -> String {
    let actions: &[&str] = match policy {
        AccessPolicy::ReadOnly => &["s3:GetObject"],
        AccessPolicy::WriteOnly => &["s3:PutObject"],
        AccessPolicy::ReadWrite => &["s3:GetObject", "s3:PutObject"],
        AccessPolicy::None => &[],
    };
    let actions_json = actions.iter().map(|a| format!("\"{a}\"")).collect::<Vec<_>>().join(",");
    format!(
        r#"{{"Version":"2012-10-17","Statement":[{{"Effect":"Allow","Principal":"*","Action":[{actions_json}],"Resource":"arn:aws:s3:::{bucket}/*"}}]}}"#
    )
}
