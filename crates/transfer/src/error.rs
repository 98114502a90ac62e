//! Transfer-engine errors: classification failures (re-exported from
//! `haul-url`) plus the catch-all kinds the engine itself can raise
//! around sessions and backend dispatch (spec.md §7).

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("classification error: {_0}")]
    Classify(#[error(not(source))] String),
    #[display("no backend resolves {_0}")]
    UnresolvedBackend(#[error(not(source))] String),
    #[display("backend error: {_0}")]
    Backend(#[error(not(source))] String),
    /// A per-item enumeration error the spec classifies as recoverable
    /// (broken symlink, unlistable entry — spec.md §4.3 Phase 1): logged
    /// and skipped, enumeration continues. Distinguished from
    /// [`ErrorKind::Backend`], whose occurrence during `enumerate` is
    /// fatal (root unreadable).
    #[display("{_0}")]
    RecoverableItem(#[error(not(source))] String),
    #[display("session error: {_0}")]
    Session(#[error(not(source))] String),
    #[display("transfer was interrupted")]
    Interrupted,
}

impl ErrorKind {
    /// True for a per-item enumeration error that should be logged and
    /// skipped rather than aborting the whole `enumerate()` pass.
    pub fn is_recoverable_item(&self) -> bool {
        matches!(self, Self::RecoverableItem(_))
    }
}

impl From<haul_url::ErrorKind> for ErrorKind {
    fn from(err: haul_url::ErrorKind) -> Self {
        ErrorKind::Classify(err.to_string())
    }
}
impl From<haul_storage::ErrorKind> for ErrorKind {
    fn from(err: haul_storage::ErrorKind) -> Self {
        if err.is_recoverable() { ErrorKind::RecoverableItem(err.to_string()) } else { ErrorKind::Backend(err.to_string()) }
    }
}
impl From<haul_session::ErrorKind> for ErrorKind {
    fn from(err: haul_session::ErrorKind) -> Self {
        ErrorKind::Session(err.to_string())
    }
}
