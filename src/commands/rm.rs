//! `rm` (spec.md §4.2 `Remove`, §6 `--incomplete`/`--force`).

use crate::backend;
use crate::context::Context;
use crate::error::Result;
use crate::output::OutputMode;
use futures::StreamExt;
use haul_storage::ContentKind;
use std::path::Path;

async fn remove_one(
    ctx: &Context,
    raw: &str,
    recursive: bool,
    incomplete: bool,
    force: bool,
) -> Result<(u64, u64)> {
    let resolved = backend::resolve(ctx, raw).await?;
    let recursive = recursive || resolved.recursive;

    if !recursive {
        match resolved.backend.remove(Path::new(""), incomplete).await {
            Ok(()) => return Ok((1, 0)),
            Err(err) if force && matches!(&*err, haul_storage::ErrorKind::ObjectMissing(_) | haul_storage::ErrorKind::PathNotFound(_)) => {
                return Ok((0, 0));
            },
            Err(err) => return Err(err.into()),
        }
    }

    let mut stream = resolved.backend.list(None, true, incomplete);
    let mut removed = 0u64;
    let mut skipped = 0u64;
    let root_path = resolved.backend.root_url().path.clone();
    while let Some(entry) = stream.next().await {
        let content = entry?;
        if content.kind == ContentKind::Directory {
            continue;
        }
        let relative = content
            .url
            .path
            .strip_prefix(root_path.trim_end_matches(['/', '\\']))
            .map(|s| s.trim_start_matches(['/', '\\']))
            .unwrap_or(&content.url.path);
        match resolved.backend.remove(Path::new(relative), incomplete).await {
            Ok(()) => removed += 1,
            Err(err) if force => {
                tracing::warn!(error = %err, url = %content.url, "skipping removal failure under --force");
                skipped += 1;
            },
            Err(err) => return Err(err.into()),
        }
    }
    Ok((removed, skipped))
}

pub async fn run(
    ctx: &Context,
    mode: OutputMode,
    recursive: bool,
    incomplete: bool,
    force: bool,
    urls: Vec<String>,
) -> Result<i32> {
    let mut total_removed = 0u64;
    let mut total_skipped = 0u64;
    for raw in urls {
        let (removed, skipped) = remove_one(ctx, &raw, recursive, incomplete, force).await?;
        total_removed += removed;
        total_skipped += skipped;
    }
    match mode {
        OutputMode::Json => println!("{}", serde_json::json!({"status": "success", "removed": total_removed, "skipped": total_skipped})),
        _ => println!("{total_removed} object(s) removed, {total_skipped} skipped"),
    }
    Ok(0)
}
