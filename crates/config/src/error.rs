//! Configuration and environment errors (spec.md §7 "Environment errors").

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("not configured: no config.json at {_0}")]
    NotConfigured(#[error(not(source))] String),
    #[display("no alias named {_0}")]
    InvalidAlias(#[error(not(source))] String),
    #[display("invalid argument: {_0}")]
    InvalidArgument(#[error(not(source))] String),
    #[display("API not implemented")]
    APINotImplemented,
    #[display("config I/O error: {_0}")]
    Io(#[error(not(source))] String),
    #[display("config parse error: {_0}")]
    Parse(#[error(not(source))] String),
}
