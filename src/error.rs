//! Top-level command-dispatch error: every core crate's typed error
//! folds into this one lowercased, one-line message (spec.md §7
//! "User-visible failure messages are lowercased one-line strings").
//!
//! The core crates keep their own closed taxonomies; this type exists
//! only so `main` has one thing to match on for the exit code and the
//! `--json` error envelope. It deliberately does not try to re-expose
//! every inner `ErrorKind` variant — that would duplicate the taxonomy
//! `exn`'s location tracking already preserves in the wrapped message.

use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("{_0}")]
    Classify(#[error(not(source))] String),
    #[display("{_0}")]
    Backend(#[error(not(source))] String),
    #[display("{_0}")]
    Transfer(#[error(not(source))] String),
    #[display("{_0}")]
    Session(#[error(not(source))] String),
    #[display("{_0}")]
    Share(#[error(not(source))] String),
    #[display("{_0}")]
    Config(#[error(not(source))] String),
    #[display("{_0}")]
    Io(#[error(not(source))] String),
    #[display("{_0}")]
    Message(#[error(not(source))] String),
}

impl AppError {
    /// A short kind tag for `--json` error envelopes (spec.md §7).
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Self::Classify(_) => "classify",
            Self::Backend(_) => "backend",
            Self::Transfer(_) => "transfer",
            Self::Session(_) => "session",
            Self::Share(_) => "share",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Message(_) => "error",
        }
    }

    /// Lowercased one-line message (spec.md §7).
    pub fn user_message(&self) -> String {
        self.to_string().to_lowercase()
    }
}

impl From<haul_url::Error> for AppError {
    fn from(err: haul_url::Error) -> Self {
        Self::Classify(err.to_string())
    }
}
impl From<haul_storage::Error> for AppError {
    fn from(err: haul_storage::Error) -> Self {
        Self::Backend(err.to_string())
    }
}
impl From<haul_diff::Error> for AppError {
    fn from(err: haul_diff::Error) -> Self {
        Self::Backend(err.to_string())
    }
}
impl From<haul_transfer::Error> for AppError {
    fn from(err: haul_transfer::Error) -> Self {
        Self::Transfer(err.to_string())
    }
}
impl From<haul_session::Error> for AppError {
    fn from(err: haul_session::Error) -> Self {
        Self::Session(err.to_string())
    }
}
impl From<haul_share::Error> for AppError {
    fn from(err: haul_share::Error) -> Self {
        Self::Share(err.to_string())
    }
}
impl From<haul_config::Error> for AppError {
    fn from(err: haul_config::Error) -> Self {
        Self::Config(err.to_string())
    }
}
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
