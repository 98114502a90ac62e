//! Difference-engine errors (spec.md §4.4).

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("failed to list {_0}")]
    ListFailed(#[error(not(source))] String),
    #[display("backend error: {_0}")]
    Backend(#[error(not(source))] String),
}
