//! Difference engine: merge-walks two sorted recursive listings and
//! classifies each key as `only-in-first`, `only-in-second`,
//! `type-differs`, or `size-differs` (spec.md §4.4).
//!
//! Comparison is size-and-type only, never content hashes — deliberately
//! (spec.md §1 non-goals).

pub mod error;

use futures::{Stream, StreamExt};
use haul_storage::{BackendHandle, Content, ContentKind};
use std::cmp::Ordering;
use std::pin::Pin;

pub use crate::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    OnlyInFirst,
    OnlyInSecond,
    TypeDiffers,
    SizeDiffers,
}

/// One emitted diff record. Exactly one of `first`/`second` is `None`
/// when `classification` is `OnlyInFirst`/`OnlyInSecond` (spec.md §3).
#[derive(Debug, Clone)]
pub struct DiffRecord {
    pub key: String,
    pub classification: Classification,
    pub first: Option<Content>,
    pub second: Option<Content>,
}

pub type DiffStream = Pin<Box<dyn Stream<Item = Result<DiffRecord>> + Send>>;

/// Strip a backend's own root prefix off one of its listing entries,
/// producing the bare key the merge-walk compares across backends.
fn relative_key(root_path: &str, entry_path: &str) -> String {
    let root = root_path.trim_end_matches(['/', '\\']);
    entry_path.strip_prefix(root).map(|s| s.trim_start_matches(['/', '\\']).to_string()).unwrap_or_else(|| entry_path.to_string())
}

/// Merge-walk `first` and `second`'s full recursive listings, in
/// lexicographic key order, emitting one [`DiffRecord`] per symmetric-
/// difference entry plus every intersection entry whose type or size
/// differs. Per-entry listing errors classified as recoverable by the
/// backend are surfaced inline without ending the walk; anything else
/// ends it with one final error item.
pub fn diff(first: BackendHandle, second: BackendHandle) -> DiffStream {
    let first_root = first.root_url().path.clone();
    let second_root = second.root_url().path.clone();
    Box::pin(async_stream::stream! {
        let mut first_list = first.list(None, true, false);
        let mut second_list = second.list(None, true, false);
        let mut a = first_list.next().await;
        let mut b = second_list.next().await;
        loop {
            if a.is_none() && b.is_none() {
                break;
            }
            if let Some(Err(err)) = &a {
                let recoverable = err.is_recoverable();
                let message = err.to_string();
                yield Err(exn::Exn::new(ErrorKind::Backend(message)));
                if !recoverable {
                    return;
                }
                a = first_list.next().await;
                continue;
            }
            if let Some(Err(err)) = &b {
                let recoverable = err.is_recoverable();
                let message = err.to_string();
                yield Err(exn::Exn::new(ErrorKind::Backend(message)));
                if !recoverable {
                    return;
                }
                b = second_list.next().await;
                continue;
            }
            match (a.take(), b.take()) {
                (None, None) => unreachable!(),
                (Some(Err(_)), _) | (_, Some(Err(_))) => unreachable!("handled above"),
                (None, Some(Ok(content))) => {
                    let key = relative_key(&second_root, &content.url.path);
                    yield Ok(DiffRecord { key, classification: Classification::OnlyInSecond, first: None, second: Some(content) });
                    b = second_list.next().await;
                },
                (Some(Ok(content)), None) => {
                    let key = relative_key(&first_root, &content.url.path);
                    yield Ok(DiffRecord { key, classification: Classification::OnlyInFirst, first: Some(content), second: None });
                    a = first_list.next().await;
                },
                (Some(Ok(a_content)), Some(Ok(b_content))) => {
                    let key_a = relative_key(&first_root, &a_content.url.path);
                    let key_b = relative_key(&second_root, &b_content.url.path);
                    match key_a.cmp(&key_b) {
                        Ordering::Less => {
                            yield Ok(DiffRecord { key: key_a, classification: Classification::OnlyInFirst, first: Some(a_content), second: None });
                            a = first_list.next().await;
                            b = Some(Ok(b_content));
                        },
                        Ordering::Greater => {
                            yield Ok(DiffRecord { key: key_b, classification: Classification::OnlyInSecond, first: None, second: Some(b_content) });
                            b = second_list.next().await;
                            a = Some(Ok(a_content));
                        },
                        Ordering::Equal => {
                            if a_content.kind != b_content.kind {
                                yield Ok(DiffRecord { key: key_a, classification: Classification::TypeDiffers, first: Some(a_content), second: Some(b_content) });
                            } else if a_content.kind == ContentKind::RegularFile && a_content.size != b_content.size {
                                yield Ok(DiffRecord { key: key_a, classification: Classification::SizeDiffers, first: Some(a_content), second: Some(b_content) });
                            }
                            a = first_list.next().await;
                            b = second_list.next().await;
                        },
                    }
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_key_strips_root() {
        assert_eq!(relative_key("/bucket/A", "/bucket/A/p"), "p");
        assert_eq!(relative_key("/bucket/A/", "/bucket/A/d/y.txt"), "d/y.txt");
    }
}
