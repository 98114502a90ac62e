//! Classification and address-parsing errors.
//!
//! These are the subset of the closed error taxonomy (spec §7) that the
//! URL value and classifier can raise on their own, before any backend
//! I/O happens.

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("path is empty")]
    EmptyPath,
    #[display("invalid source: {_0}")]
    InvalidSource(#[error(not(source))] String),
    #[display("invalid target: {_0}")]
    InvalidTarget(#[error(not(source))] String),
    #[display("source and target are the same location")]
    SourceTargetSame,
    #[display("source is a directory")]
    SourceIsDir,
    #[display("source is not a directory")]
    SourceIsNotDir,
    #[display("source is not a regular file")]
    SourceIsNotFile,
    #[display("source must be marked recursive (suffix with `...`) to copy a directory")]
    SourceNotRecursive,
    #[display("target is not a directory")]
    TargetIsNotDir,
    #[display("target not found")]
    TargetNotFound,
    #[display("source list is empty")]
    SourceListEmpty,
    #[display("cannot join URLs of different schemes")]
    IncompatibleSchemes,
}
