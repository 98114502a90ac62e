//! Mirror engine (spec.md §4.5): built directly on [`haul_diff::diff`].
//!
//! Each diff record becomes either a scheduled transfer (fed through the
//! same two-phase [`crate::engine::TransferEngine`] as `cp`, and
//! therefore resumable) or a reported conflict. Mirror never deletes
//! from the target — `only-in-second` is silently ignored.

use crate::error::{ErrorKind, Result};
use crate::plan::PlanItem;
use futures::{Stream, StreamExt};
use haul_diff::{Classification, DiffRecord};
use haul_storage::BackendHandle;
use std::pin::Pin;

/// A diff record mirror declined to schedule: `type-differs` always, and
/// `size-differs` when `--force` was not passed (spec.md §4.5).
#[derive(Debug, Clone)]
pub struct MirrorConflict {
    pub key: String,
    pub classification: Classification,
}

/// One outcome of walking the diff stream: either a transfer to enqueue,
/// or a conflict to report without touching the target.
#[derive(Debug, Clone)]
pub enum MirrorItem {
    Transfer(PlanItem),
    Conflict(MirrorConflict),
}

pub type MirrorStream = Pin<Box<dyn Stream<Item = Result<MirrorItem>> + Send>>;

/// Plan a `mirror first second` run (spec.md §4.5):
///
/// - `only-in-first` → transfer `first` → `second` (at the same relative key).
/// - `size-differs` → transfer iff `force`, else a conflict.
/// - `type-differs` → always a conflict.
/// - `only-in-second` → ignored; mirror never deletes from the target.
pub fn plan_mirror(first: BackendHandle, second: BackendHandle, force: bool) -> MirrorStream {
    Box::pin(async_stream::stream! {
        let mut diffs = haul_diff::diff(first.clone(), second.clone());
        while let Some(record) = diffs.next().await {
            match record {
                Ok(DiffRecord { key, classification: Classification::OnlyInFirst, first: Some(content), .. }) => {
                    match second.root_url().join(&key) {
                        Ok(target_url) => yield Ok(MirrorItem::Transfer(PlanItem { source: content, targets: vec![target_url] })),
                        Err(err) => yield Err(exn::Exn::new(ErrorKind::Classify(err.to_string()))),
                    }
                },
                Ok(DiffRecord { key, classification: Classification::SizeDiffers, first: Some(content), .. }) if force => {
                    match second.root_url().join(&key) {
                        Ok(target_url) => yield Ok(MirrorItem::Transfer(PlanItem { source: content, targets: vec![target_url] })),
                        Err(err) => yield Err(exn::Exn::new(ErrorKind::Classify(err.to_string()))),
                    }
                },
                Ok(DiffRecord { key, classification: Classification::SizeDiffers, .. }) => {
                    yield Ok(MirrorItem::Conflict(MirrorConflict { key, classification: Classification::SizeDiffers }));
                },
                Ok(DiffRecord { key, classification: Classification::TypeDiffers, .. }) => {
                    yield Ok(MirrorItem::Conflict(MirrorConflict { key, classification: Classification::TypeDiffers }));
                },
                Ok(DiffRecord { classification: Classification::OnlyInSecond, .. }) => {},
                Ok(DiffRecord { classification: Classification::OnlyInFirst, first: None, .. }) => {
                    unreachable!("only-in-first always carries a first Content (spec.md §3)");
                },
                Err(err) => yield Err(exn::Exn::new(ErrorKind::Backend(err.to_string()))),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use haul_storage::backend::filesystem::FilesystemBackend;
    use haul_url::Url;
    use std::sync::Arc;

    fn fs_backend(root: &std::path::Path) -> BackendHandle {
        let url = Url::parse_file(root).unwrap();
        Arc::new(FilesystemBackend::new("local", url, root).unwrap())
    }

    #[tokio::test]
    async fn only_in_first_schedules_a_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("A");
        let b = dir.path().join("B");
        tokio::fs::create_dir_all(&a).await.unwrap();
        tokio::fs::create_dir_all(&b).await.unwrap();
        tokio::fs::write(a.join("p"), b"abc").await.unwrap();
        tokio::fs::write(a.join("q"), b"abcd").await.unwrap();
        tokio::fs::write(b.join("p"), b"abc").await.unwrap();
        tokio::fs::write(b.join("r"), b"123456789").await.unwrap();

        let first = fs_backend(&a);
        let second = fs_backend(&b);
        let mut stream = plan_mirror(first, second, false);
        let mut transfers = Vec::new();
        let mut conflicts = Vec::new();
        while let Some(item) = stream.next().await {
            match item.unwrap() {
                MirrorItem::Transfer(plan) => transfers.push(plan),
                MirrorItem::Conflict(c) => conflicts.push(c),
            }
        }
        assert_eq!(transfers.len(), 1);
        assert!(transfers[0].targets[0].path.ends_with("q"));
        assert!(conflicts.is_empty());
    }

    #[tokio::test]
    async fn size_differs_is_a_conflict_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("A");
        let b = dir.path().join("B");
        tokio::fs::create_dir_all(&a).await.unwrap();
        tokio::fs::create_dir_all(&b).await.unwrap();
        tokio::fs::write(a.join("p"), b"short").await.unwrap();
        tokio::fs::write(b.join("p"), b"a-much-longer-value").await.unwrap();

        let first = fs_backend(&a);
        let second = fs_backend(&b);
        let mut stream = plan_mirror(first, second, false);
        let item = stream.next().await.unwrap().unwrap();
        assert!(matches!(item, MirrorItem::Conflict(MirrorConflict { classification: Classification::SizeDiffers, .. })));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn size_differs_schedules_transfer_with_force() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("A");
        let b = dir.path().join("B");
        tokio::fs::create_dir_all(&a).await.unwrap();
        tokio::fs::create_dir_all(&b).await.unwrap();
        tokio::fs::write(a.join("p"), b"short").await.unwrap();
        tokio::fs::write(b.join("p"), b"a-much-longer-value").await.unwrap();

        let first = fs_backend(&a);
        let second = fs_backend(&b);
        let mut stream = plan_mirror(first, second, true);
        let item = stream.next().await.unwrap().unwrap();
        assert!(matches!(item, MirrorItem::Transfer(_)));
    }
}
