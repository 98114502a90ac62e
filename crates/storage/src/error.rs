//! Backend error taxonomy (spec.md §7).
//!
//! A closed set shared by every backend implementation, mirroring the
//! teacher's `rawr_storage::error` (`exn`-based, location-tracked). Two
//! groups of the spec's full taxonomy live elsewhere because they never
//! originate from a backend: classification errors
//! (`InvalidSource`/`TargetNotFound`/...) live in `haul-url`, environment
//! errors (`NotConfigured`/`InvalidAlias`/...) live in `haul-config`.

use derive_more::{Display, Error};
use std::io;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    // --- Path/address errors ---
    #[display("path not found: {_0}")]
    PathNotFound(#[error(not(source))] String),
    #[display("insufficient permission: {_0}")]
    PathInsufficientPermission(#[error(not(source))] String),
    #[display("path is not a regular file: {_0}")]
    PathIsNotRegular(#[error(not(source))] String),
    #[display("broken symlink: {_0}")]
    BrokenSymlink(#[error(not(source))] String),
    #[display("too many levels of symbolic links: {_0}")]
    TooManyLevelsSymlink(#[error(not(source))] String),
    #[display("path is empty")]
    EmptyPath,

    // --- Object-storage errors ---
    #[display("bucket name is empty")]
    BucketNameEmpty,
    #[display("bucket name cannot be used as a top-level object key")]
    BucketNameTopLevel,
    #[display("bucket does not exist: {_0}")]
    BucketDoesNotExist(#[error(not(source))] String),
    #[display("bucket is not empty: {_0}")]
    BucketNotEmpty(#[error(not(source))] String),
    #[display("invalid bucket: {_0}")]
    BucketInvalid(#[error(not(source))] String),
    #[display("object not found: {_0}")]
    ObjectMissing(#[error(not(source))] String),
    #[display("object already exists: {_0}")]
    ObjectAlreadyExists(#[error(not(source))] String),

    // --- Transfer errors ---
    #[display("unexpected EOF: read fewer bytes than the declared size")]
    UnexpectedEOF,
    #[display("unexpected excess read: more bytes available than the declared size")]
    UnexpectedExcessRead,
    #[display("unexpected short write")]
    UnexpectedShortWrite,

    // --- Environment / capability ---
    #[display("API not implemented by this backend")]
    APINotImplemented,

    // --- Transport / catch-all ---
    #[display("I/O error: {_0}")]
    Io(io::Error),
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
}
impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(err)
    }
}

impl ErrorKind {
    /// Recoverable per-item errors: the transfer engine skips the item
    /// and reports it, but the overall command continues (spec.md §4.3,
    /// §7 "Propagation policy").
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::BrokenSymlink(_)
                | Self::TooManyLevelsSymlink(_)
                | Self::PathNotFound(_)
                | Self::PathInsufficientPermission(_)
                | Self::BucketNameEmpty
                | Self::ObjectMissing(_)
                | Self::ObjectAlreadyExists(_)
                | Self::BucketDoesNotExist(_)
                | Self::BucketInvalid(_)
        )
    }

    /// True if retrying the operation that produced this error might
    /// succeed (used by the bounded backoff around idempotent reads,
    /// spec.md §9 Open Questions).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Network(_) | Self::BackendError(_))
    }
}
