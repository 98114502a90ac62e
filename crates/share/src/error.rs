//! Shared-URL store errors.

use derive_more::{Display, Error};
use std::io;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("share expiry must be between 1 second and 7 days, got {_0:?}")]
    ExpiryOutOfBounds(#[error(not(source))] std::time::Duration),
    #[display("no share entry for {_0}")]
    NotFound(#[error(not(source))] String),
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
