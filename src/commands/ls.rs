//! `ls` (spec.md §4.2 `List`).

use crate::backend;
use crate::context::Context;
use crate::error::Result;
use crate::output::OutputMode;
use futures::StreamExt;
use haul_storage::ContentKind;

fn kind_marker(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Directory => "DIR",
        ContentKind::RegularFile => "",
        ContentKind::Symlink => "LNK",
        ContentKind::IncompleteUpload => "PART",
    }
}

pub async fn run(ctx: &Context, mode: OutputMode, url: Option<String>, recursive: bool, incomplete: bool) -> Result<i32> {
    let raw = url.unwrap_or_else(|| ".".to_string());
    let resolved = backend::resolve(ctx, &raw).await?;
    let mut stream = resolved.backend.list(None, recursive || resolved.recursive, incomplete);
    while let Some(entry) = stream.next().await {
        let content = entry?;
        match mode {
            OutputMode::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "url": content.url.to_display_string(),
                        "size": content.size,
                        "kind": kind_marker(content.kind),
                        "modified": content.modified.to_string(),
                    })
                );
            },
            _ => {
                println!("{:>12}  {:>4}  {}", content.size, kind_marker(content.kind), content.url.to_display_string());
            },
        }
    }
    Ok(0)
}
