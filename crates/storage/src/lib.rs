//! Uniform `List/Stat/Get/Put/Copy/Remove/Share` backend contract (spec.md
//! §4.2) over the filesystem and S3-compatible object storage, plus the
//! shared [`Content`] value and access-policy/progress types the rest of
//! the workspace builds on.

pub mod access;
pub mod backend;
pub mod content;
pub mod error;
pub mod progress;

pub use crate::access::AccessPolicy;
pub use crate::backend::{Backend, BackendHandle, ContentStream, CopyOutcome, UploadForm};
pub use crate::content::{Content, ContentKind};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::progress::{NullProgress, ProgressSink, ProgressTap};
