//! The transfer engine: phase 1 (enumerate) drains a [`PlanStream`] into
//! a [`Session`]'s data log; phase 2 (execute) replays the log through a
//! bounded worker pool with a single serializing status collector
//! (spec.md §4.3, §5).

use crate::accounter::{Accounter, AccounterSink};
use crate::error::{ErrorKind, Result};
use crate::plan::{PlanItem, PlanStream};
use futures::StreamExt;
use haul_session::Session;
use haul_storage::{Backend, BackendHandle, CopyOutcome, ProgressTap};
use haul_url::Url;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};

/// Resolves the backend that owns a given (absolute) source URL. The
/// engine is agnostic to how many distinct source backends a `cp`
/// invocation touches (shape D may span several aliases); the caller
/// (command glue) builds this from whichever backends it resolved the
/// user's source arguments to.
pub type BackendResolver = Arc<dyn Fn(&Url) -> Option<BackendHandle> + Send + Sync>;

/// `max(1, logical-CPU-count - 1)` (spec.md §4.3).
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1).saturating_sub(1).max(1)
}

#[derive(Debug, Default)]
pub struct EngineOutcome {
    pub completed: u64,
    pub skipped: u64,
    pub bytes: u64,
    pub interrupted: bool,
    /// Set when a transport/unclassified error terminated the command
    /// early; the session remains on disk for `session resume`
    /// (spec.md §4.3).
    pub fatal: Option<String>,
}

fn relative_path(root_path: &str, entry_path: &str) -> String {
    let root = root_path.trim_end_matches(['/', '\\']);
    entry_path.strip_prefix(root).map(|s| s.trim_start_matches(['/', '\\']).to_string()).unwrap_or_else(|| entry_path.to_string())
}

/// One worker's unit of execution: `Get`+`Put` (or same-backend `Copy`)
/// for every target of one plan item, sequentially over a single source
/// read (spec.md §5 "tee'd to targets in order").
async fn execute_item(
    item: &PlanItem,
    source_backend: &BackendHandle,
    target_backend: &BackendHandle,
    accounter: &Arc<Accounter>,
) -> haul_storage::Result<u64> {
    let source_relative = relative_path(&source_backend.root_url().path, &item.source.url.path);
    let size = item.source.size;
    let mut written = 0u64;

    if item.targets.len() == 1 {
        let target_relative = relative_path(&target_backend.root_url().path, &item.targets[0].path);
        let progress: ProgressTap = Arc::new(AccounterSink(accounter.clone()));
        match target_backend.copy(&item.source.url, Path::new(&target_relative), size, progress.clone()).await? {
            CopyOutcome::Copied(n) => return Ok(n),
            CopyOutcome::NotSupported => {},
        }
        let reader = source_backend.get(Path::new(&source_relative)).await?;
        written = target_backend.put(Path::new(&target_relative), reader, size, None, progress).await?;
        return Ok(written);
    }

    // Multiple targets: the source is read once and tee'd in order. A
    // fully-streamed tee needs one duplex pipe per extra target; since
    // every CLI command we drive only ever produces one target, this
    // path buffers the (bounded) object once rather than carrying that
    // machinery for a shape the glue layer never actually emits.
    let mut reader = source_backend.get(Path::new(&source_relative)).await?;
    let mut buf = Vec::with_capacity(size as usize);
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buf).await.map_err(haul_storage::ErrorKind::from)?;
    for target_url in &item.targets {
        let target_relative = relative_path(&target_backend.root_url().path, &target_url.path);
        let progress: ProgressTap = Arc::new(AccounterSink(accounter.clone()));
        match target_backend.copy(&item.source.url, Path::new(&target_relative), size, progress.clone()).await? {
            CopyOutcome::Copied(n) => {
                written = n;
                continue;
            },
            CopyOutcome::NotSupported => {},
        }
        let cursor: haul_storage::backend::BoxAsyncRead = Box::pin(std::io::Cursor::new(buf.clone()));
        written = target_backend.put(Path::new(&target_relative), cursor, size, None, progress).await?;
    }
    Ok(written)
}

fn item_key(item: &PlanItem) -> String {
    item.source.url.to_display_string()
}

pub struct TransferEngine {
    concurrency: usize,
}

impl TransferEngine {
    pub fn new(concurrency: usize) -> Self {
        Self { concurrency: concurrency.max(1) }
    }

    /// Phase 1 (spec.md §4.3): drain the planner into the session's data
    /// log, updating running totals per item. A recoverable per-item
    /// error (broken symlink, unlistable entry) is logged and skipped; a
    /// fatal one (root unreadable) deletes the session and aborts.
    pub async fn enumerate(&self, mut session: Session, mut plan: PlanStream) -> Result<Session> {
        while let Some(item) = plan.next().await {
            match item {
                Ok(item) => {
                    let size = item.source.size;
                    session.enumerate_item(&item, size).await.map_err(|e| exn::Exn::new(ErrorKind::Session(e.to_string())))?;
                },
                Err(err) if err.is_recoverable_item() => {
                    tracing::warn!(error = %err, "skipping unlistable entry, enumeration continues");
                    continue;
                },
                Err(err) => {
                    tracing::warn!(error = %err, "enumeration error, terminating session");
                    let _ = session.delete().await;
                    return Err(exn::Exn::new(ErrorKind::Classify(err.to_string())));
                },
            }
        }
        session.finish_enumeration().await.map_err(|e| exn::Exn::new(ErrorKind::Session(e.to_string())))?;
        Ok(session)
    }

    /// Phase 2 (spec.md §4.3, §5): fast-forward past `last_completed`,
    /// then dispatch the remainder through a bounded worker pool with a
    /// single status collector that only ever advances `last_completed`
    /// contiguously — a worker finishing out of order never creates a
    /// gap (spec.md §5 ordering guarantees).
    pub async fn execute(
        &self,
        mut session: Session,
        source_resolver: BackendResolver,
        target_backend: BackendHandle,
        accounter: Arc<Accounter>,
        mut interrupt: watch::Receiver<bool>,
    ) -> Result<EngineOutcome> {
        let items: Vec<PlanItem> =
            session.read_items().await.map_err(|e| exn::Exn::new(ErrorKind::Session(e.to_string())))?;
        let mut start_index = 0;
        if let Some(marker) = session.header.last_completed.clone() {
            if let Some(pos) = items.iter().position(|item| item_key(item) == marker) {
                start_index = pos + 1;
                for item in &items[..start_index] {
                    accounter.add(item.source.size);
                    accounter.object_done();
                }
            }
        }

        let mut outcome = EngineOutcome::default();
        if start_index >= items.len() {
            return Ok(outcome);
        }

        let (work_tx, work_rx) = async_channel(self.concurrency);
        let (status_tx, mut status_rx) = mpsc::unbounded_channel::<WorkerStatus>();
        let abort = Arc::new(AtomicBool::new(false));

        let mut worker_handles = Vec::with_capacity(self.concurrency);
        for _ in 0..self.concurrency {
            let work_rx = work_rx.clone();
            let status_tx = status_tx.clone();
            let source_resolver = source_resolver.clone();
            let target_backend = target_backend.clone();
            let accounter = accounter.clone();
            worker_handles.push(tokio::spawn(async move {
                while let Ok((index, item)) = work_rx.recv().await {
                    let Some(source_backend) = source_resolver(&item.source.url) else {
                        let _ = status_tx.send(WorkerStatus {
                            index,
                            key: item_key(&item),
                            bytes: item.source.size,
                            result: Err(format!("no backend resolves {}", item.source.url)),
                            recoverable: false,
                        });
                        continue;
                    };
                    let result = execute_item(&item, &source_backend, &target_backend, &accounter).await;
                    let status = match result {
                        Ok(bytes) => {
                            accounter.object_done();
                            WorkerStatus { index, key: item_key(&item), bytes, result: Ok(()), recoverable: false }
                        },
                        Err(err) => {
                            let recoverable = err.is_recoverable();
                            WorkerStatus {
                                index,
                                key: item_key(&item),
                                bytes: item.source.size,
                                result: Err(err.to_string()),
                                recoverable,
                            }
                        },
                    };
                    let _ = status_tx.send(status);
                }
            }));
        }
        drop(status_tx);
        drop(work_rx);

        let producer = {
            let work_tx = work_tx.clone();
            let abort = abort.clone();
            let interrupt = interrupt.clone();
            let remaining: Vec<(usize, PlanItem)> = items[start_index..].iter().cloned().enumerate().map(|(i, item)| (start_index + i, item)).collect();
            tokio::spawn(async move {
                for (index, item) in remaining {
                    if abort.load(Ordering::SeqCst) || *interrupt.borrow() {
                        break;
                    }
                    if work_tx.send((index, item)).await.is_err() {
                        break;
                    }
                }
            })
        };
        drop(work_tx);

        let mut pending: HashMap<usize, (String, u64)> = HashMap::new();
        let mut next_to_persist = start_index;
        while let Some(status) = status_rx.recv().await {
            if *interrupt.borrow() {
                outcome.interrupted = true;
            }
            match status.result {
                Ok(()) => {
                    outcome.completed += 1;
                    outcome.bytes += status.bytes;
                    pending.insert(status.index, (status.key, status.bytes));
                    while let Some((key, _bytes)) = pending.remove(&next_to_persist) {
                        session
                            .advance_last_completed(key)
                            .await
                            .map_err(|e| exn::Exn::new(ErrorKind::Session(e.to_string())))?;
                        next_to_persist += 1;
                    }
                },
                Err(message) if status.recoverable => {
                    tracing::warn!(error = %message, url = %status.key, "skipping item");
                    outcome.skipped += 1;
                    pending.insert(status.index, (status.key, 0));
                    while pending.contains_key(&next_to_persist) {
                        pending.remove(&next_to_persist);
                        next_to_persist += 1;
                    }
                },
                Err(message) => {
                    tracing::error!(error = %message, url = %status.key, "fatal transfer error");
                    outcome.fatal = Some(message);
                    abort.store(true, Ordering::SeqCst);
                },
            }
        }
        let _ = producer.await;
        for handle in worker_handles {
            let _ = handle.await;
        }

        if *interrupt.borrow() {
            outcome.interrupted = true;
        }

        if outcome.interrupted || outcome.fatal.is_some() {
            session.close_and_die().await.map_err(|e| exn::Exn::new(ErrorKind::Session(e.to_string())))?;
        } else if next_to_persist >= items.len() {
            session.delete().await.map_err(|e| exn::Exn::new(ErrorKind::Session(e.to_string())))?;
        } else {
            // Not every item reached completion (e.g. all remaining were
            // skipped without reaching the tail) but none were fatal;
            // leave the session so a retry can pick up where it left off.
            session.close_and_die().await.map_err(|e| exn::Exn::new(ErrorKind::Session(e.to_string())))?;
        }

        Ok(outcome)
    }
}

struct WorkerStatus {
    index: usize,
    key: String,
    bytes: u64,
    result: std::result::Result<(), String>,
    recoverable: bool,
}

/// A minimal bounded MPMC channel built on `async-channel`-shaped
/// semantics using only what's in the workspace already: `tokio::sync`'s
/// `mpsc` is SPSC-on-the-receiver, so the worker pool instead shares one
/// receiver behind a mutex-free `flume`-style clone via `async_channel`
/// would be an extra dependency; here every worker gets its own clone of
/// a `kanal`-free receiver built from `tokio::sync::mpsc` wrapped in an
/// `Arc<Mutex<..>>` so multiple tasks can `recv` from the same queue.
fn async_channel<T: Send + 'static>(capacity: usize) -> (WorkSender<T>, WorkReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (WorkSender(tx), WorkReceiver(Arc::new(tokio::sync::Mutex::new(rx))))
}

#[derive(Clone)]
struct WorkSender<T>(mpsc::Sender<T>);
impl<T> WorkSender<T> {
    async fn send(&self, value: T) -> std::result::Result<(), mpsc::error::SendError<T>> {
        self.0.send(value).await
    }
}

struct WorkReceiver<T>(Arc<tokio::sync::Mutex<mpsc::Receiver<T>>>);
impl<T> Clone for WorkReceiver<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}
impl<T> WorkReceiver<T> {
    async fn recv(&self) -> std::result::Result<T, ()> {
        self.0.lock().await.recv().await.ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haul_session::SessionStore;
    use haul_storage::backend::filesystem::FilesystemBackend;
    use haul_url::Url;
    use std::sync::Arc as StdArc;

    fn fs_backend(root: &std::path::Path) -> BackendHandle {
        let url = Url::parse_file(root).unwrap();
        StdArc::new(FilesystemBackend::new("local", url, root).unwrap())
    }

    #[tokio::test]
    async fn enumerate_then_execute_copies_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.bin");
        tokio::fs::write(&src, b"hello world").await.unwrap();
        let dst = dir.path().join("b.bin");

        let source_backend = fs_backend(&src);
        let target_backend = fs_backend(&dst);
        let plan = crate::plan::plan(
            vec![crate::plan::PlannedSource { backend: source_backend.clone(), recursive: false }],
            target_backend.clone(),
        );

        let session_dir = dir.path().join("sessions");
        let store = SessionStore::new(&session_dir);
        let session = store.create("cp", vec![], serde_json::json!({}), dir.path().to_path_buf()).await.unwrap();

        let engine = TransferEngine::new(2);
        let session = engine.enumerate(session, plan).await.unwrap();
        assert_eq!(session.header.total_objects, 1);
        assert_eq!(session.header.total_bytes, 11);

        let accounter = Accounter::new(session.header.total_bytes, session.header.total_objects);
        let (_tx, rx) = watch::channel(false);
        let resolver: BackendResolver = Arc::new(move |_url| Some(source_backend.clone()));
        let outcome = engine.execute(session, resolver, target_backend, accounter, rx).await.unwrap();
        assert_eq!(outcome.completed, 1);
        assert_eq!(outcome.bytes, 11);
        assert!(outcome.fatal.is_none());
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"hello world");
        let _ = store;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn enumerate_skips_broken_symlink_and_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        let src_dir = dir.path().join("src");
        tokio::fs::create_dir_all(&src_dir).await.unwrap();
        tokio::fs::write(src_dir.join("ok.txt"), b"hello").await.unwrap();
        std::os::unix::fs::symlink(src_dir.join("missing-target"), src_dir.join("broken")).unwrap();
        let dst_dir = dir.path().join("dst");
        tokio::fs::create_dir_all(&dst_dir).await.unwrap();

        let source_backend = fs_backend(&src_dir);
        let target_backend = fs_backend(&dst_dir);
        let plan = crate::plan::plan(
            vec![crate::plan::PlannedSource { backend: source_backend.clone(), recursive: true }],
            target_backend.clone(),
        );

        let session_dir = dir.path().join("sessions");
        let store = SessionStore::new(&session_dir);
        let session = store.create("cp", vec![], serde_json::json!({}), dir.path().to_path_buf()).await.unwrap();

        let engine = TransferEngine::new(2);
        // A broken symlink under the recursive source must not abort
        // enumeration or delete the session (spec.md §4.3 Phase 1).
        let session = engine.enumerate(session, plan).await.unwrap();
        assert_eq!(session.header.total_objects, 1);
        assert_eq!(session.header.total_bytes, 5);
        let _ = store;
    }
}
