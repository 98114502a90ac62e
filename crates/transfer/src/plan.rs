//! The planner: turns a `(sources, target)` tuple into a lazy sequence
//! of [`PlanItem`]s by classifying the tuple (spec.md §4.1) and then
//! expanding shapes B/C/D down to a stream of shape-A pairs.

use crate::error::{ErrorKind, Result};
use futures::{Stream, StreamExt};
use haul_storage::{BackendHandle, Content, ContentKind};
use haul_url::{Kind, Shape, SourceSpec, TargetSpec, Url, classify, recursive_target, target_for_shape_b};
use std::path::Path;
use std::pin::Pin;

/// One already-resolved source argument: the backend bound to it, and
/// whether the user asked for recursive descent (`...` suffix or
/// `--recursive`).
pub struct PlannedSource {
    pub backend: BackendHandle,
    pub recursive: bool,
}

/// A source [`Content`] paired with the target URL(s) it should be
/// copied to (spec.md §3 "Copy/Transfer plan item"). Serializable
/// verbatim into the session data log.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlanItem {
    pub source: Content,
    pub targets: Vec<Url>,
}

pub type PlanStream = Pin<Box<dyn Stream<Item = Result<PlanItem>> + Send>>;

fn kind_of(content: &Content) -> Kind {
    match content.kind {
        ContentKind::Directory => Kind::Directory,
        ContentKind::RegularFile | ContentKind::Symlink | ContentKind::IncompleteUpload => Kind::Regular,
    }
}

/// Strip a backend's own root path off one of its own listing entries,
/// producing the key relative to that root (shared logic with
/// `haul-diff`'s merge-walk, duplicated here to avoid a dependency
/// cycle: diff depends on storage only, not on this crate).
fn relative_to_root(root_path: &str, entry_path: &str) -> String {
    let root = root_path.trim_end_matches(['/', '\\']);
    entry_path.strip_prefix(root).map(|s| s.trim_start_matches(['/', '\\']).to_string()).unwrap_or_else(|| entry_path.to_string())
}

async fn stat_root(backend: &BackendHandle) -> Result<Option<Content>> {
    match backend.stat(Path::new("")).await {
        Ok(content) => Ok(Some(content)),
        Err(err) if matches!(&*err, haul_storage::ErrorKind::PathNotFound(_)) => Ok(None),
        Err(err) => Err(exn::Exn::new(ErrorKind::Backend(err.to_string()))),
    }
}

/// Expand a single recursive source directory into one [`PlanItem`] per
/// discovered regular file, joining the preserved relative path onto
/// `target_root` (spec.md §4.1 "Recursion expansion policy for shape C").
fn expand_directory(source: BackendHandle, target_root: Url) -> PlanStream {
    let source_root_path = source.root_url().path.clone();
    Box::pin(async_stream::stream! {
        let mut entries = source.list(None, true, false);
        while let Some(item) = entries.next().await {
            match item {
                Ok(content) if content.kind == ContentKind::Directory => continue,
                Ok(content) => {
                    let relative = relative_to_root(&source_root_path, &content.url.path);
                    match recursive_target(&target_root, &relative) {
                        Ok(target_url) => yield Ok(PlanItem { source: content, targets: vec![target_url] }),
                        Err(err) => yield Err(exn::Exn::new(ErrorKind::Classify(err.to_string()))),
                    }
                },
                Err(err) if err.is_recoverable() => {
                    yield Err(exn::Exn::new(ErrorKind::RecoverableItem(err.to_string())));
                },
                Err(err) => {
                    yield Err(exn::Exn::new(ErrorKind::Backend(err.to_string())));
                    return;
                },
            }
        }
    })
}

/// Plan a `cp`-shaped transfer: one or more sources onto one target
/// (spec.md §4.1 shapes A-D). Classification happens eagerly (it's one
/// `Stat` per source plus one for the target); expansion is lazy.
pub fn plan(sources: Vec<PlannedSource>, target: BackendHandle) -> PlanStream {
    Box::pin(async_stream::stream! {
        let mut source_specs = Vec::with_capacity(sources.len());
        let mut source_contents = Vec::with_capacity(sources.len());
        for planned in &sources {
            match stat_root(&planned.backend).await {
                Ok(Some(content)) => {
                    source_specs.push(SourceSpec { url: planned.backend.root_url().clone(), recursive: planned.recursive, kind: kind_of(&content) });
                    source_contents.push(content);
                },
                Ok(None) => {
                    yield Err(exn::Exn::new(ErrorKind::Classify(format!("source not found: {}", planned.backend.root_url()))));
                    return;
                },
                Err(err) => { yield Err(err); return; },
            }
        }
        let target_content = match stat_root(&target).await {
            Ok(content) => content,
            Err(err) => { yield Err(err); return; },
        };
        let target_spec = TargetSpec { url: target.root_url().clone(), kind: target_content.as_ref().map(kind_of) };

        let shape = match classify(&source_specs, &target_spec) {
            Ok(shape) => shape,
            Err(err) => { yield Err(exn::Exn::new(ErrorKind::Classify(err.to_string()))); return; },
        };

        match shape {
            Shape::A => {
                yield Ok(PlanItem { source: source_contents.remove(0), targets: vec![target.root_url().clone()] });
            },
            Shape::B => {
                let content = source_contents.remove(0);
                match target_for_shape_b(&content.url, target.root_url()) {
                    Ok(target_url) => yield Ok(PlanItem { source: content, targets: vec![target_url] }),
                    Err(err) => yield Err(exn::Exn::new(ErrorKind::Classify(err.to_string()))),
                }
            },
            Shape::C => {
                let planned = sources.into_iter().next().expect("shape C has exactly one source");
                let mut inner = expand_directory(planned.backend, target.root_url().clone());
                while let Some(item) = inner.next().await {
                    yield item;
                }
            },
            Shape::D => {
                for (planned, (spec, content)) in sources.into_iter().zip(source_specs.into_iter().zip(source_contents)) {
                    match spec.kind {
                        Kind::Directory => {
                            let mut inner = expand_directory(planned.backend, target.root_url().clone());
                            while let Some(item) = inner.next().await {
                                yield item;
                            }
                        },
                        Kind::Regular if planned.recursive => {
                            let mut inner = expand_directory(planned.backend, target.root_url().clone());
                            while let Some(item) = inner.next().await {
                                yield item;
                            }
                        },
                        Kind::Regular => {
                            match target_for_shape_b(&content.url, target.root_url()) {
                                Ok(target_url) => yield Ok(PlanItem { source: content, targets: vec![target_url] }),
                                Err(err) => yield Err(exn::Exn::new(ErrorKind::Classify(err.to_string()))),
                            }
                        },
                    }
                }
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use haul_storage::backend::filesystem::FilesystemBackend;
    use std::sync::Arc;

    fn fs_backend(root: &std::path::Path) -> BackendHandle {
        let url = Url::parse_file(root).unwrap();
        Arc::new(FilesystemBackend::new("local", url, root).unwrap())
    }

    #[tokio::test]
    async fn shape_a_single_file_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let src_path = dir.path().join("a.bin");
        tokio::fs::write(&src_path, b"hello").await.unwrap();
        let dst_path = dir.path().join("b.bin");

        let source = fs_backend(&src_path);
        let target = fs_backend(&dst_path);
        let mut stream = plan(vec![PlannedSource { backend: source, recursive: false }], target);
        let item = stream.next().await.unwrap().unwrap();
        assert_eq!(item.source.size, 5);
        assert_eq!(item.targets.len(), 1);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn shape_c_recursive_directory_preserves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let src_dir = dir.path().join("src");
        tokio::fs::create_dir_all(src_dir.join("d")).await.unwrap();
        tokio::fs::write(src_dir.join("x.txt"), b"hello").await.unwrap();
        tokio::fs::write(src_dir.join("d/y.txt"), b"goodbye").await.unwrap();
        let dst_dir = dir.path().join("dst");
        tokio::fs::create_dir_all(&dst_dir).await.unwrap();

        let source = fs_backend(&src_dir);
        let target = fs_backend(&dst_dir);
        let mut stream = plan(vec![PlannedSource { backend: source, recursive: true }], target);
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item.unwrap());
        }
        items.sort_by_key(|i| i.source.url.path.clone());
        assert_eq!(items.len(), 2);
        assert!(items[0].targets[0].path.ends_with("d/y.txt") || items[0].targets[0].path.ends_with("x.txt"));
    }
}
