//! Session-store errors.

use derive_more::{Display, Error};
use std::io;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("session not found: {_0}")]
    NotFound(#[error(not(source))] String),
    #[display("session is not resumable: {_0}")]
    NotResumable(#[error(not(source))] String),
    #[display("corrupt session data log: {_0}")]
    CorruptLog(#[error(not(source))] String),
    #[display("I/O error: {_0}")]
    Io(io::Error),
    #[display("serialization error: {_0}")]
    Serde(#[error(not(source))] String),
}
impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(err)
    }
}
impl From<serde_json::Error> for ErrorKind {
    fn from(err: serde_json::Error) -> Self {
        ErrorKind::Serde(err.to_string())
    }
}
