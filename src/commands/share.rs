//! `share` (spec.md §4.7): presigned-URL lifecycle over the shared-URL
//! store.

use crate::backend;
use crate::cli::ShareKindArg;
use crate::context::Context;
use crate::error::{AppError, Result};
use crate::output::OutputMode;
use haul_share::{Artifact, ShareEntry, ShareKind};
use std::path::Path;
use time::OffsetDateTime;

fn parse_duration(raw: &str) -> Result<std::time::Duration> {
    raw.parse::<humantime::Duration>().map(Into::into).map_err(|e| AppError::Message(format!("invalid duration {raw:?}: {e}")))
}

pub async fn download(ctx: &Context, mode: OutputMode, url: String, duration: String) -> Result<i32> {
    let expiry = parse_duration(&duration)?;
    haul_share::validate_expiry(expiry)?;
    let resolved = backend::resolve(ctx, &url).await?;
    let href = resolved.backend.share_download(Path::new(""), expiry).await?;
    let entry = ShareEntry {
        key: url.clone(),
        kind: ShareKind::Download,
        expiry,
        created: OffsetDateTime::now_utc(),
        artifact: Artifact::Url { href: href.clone() },
    };
    ctx.shares.add(entry).await?;
    match mode {
        OutputMode::Json => println!("{}", serde_json::json!({"url": url, "href": href})),
        _ => println!("{href}"),
    }
    Ok(0)
}

pub async fn upload(
    ctx: &Context,
    mode: OutputMode,
    url: String,
    duration: String,
    recursive: bool,
    content_type: Option<String>,
) -> Result<i32> {
    let expiry = parse_duration(&duration)?;
    haul_share::validate_expiry(expiry)?;
    let resolved = backend::resolve(ctx, &url).await?;
    let form = resolved.backend.share_upload(Path::new(""), recursive, expiry, content_type.as_deref()).await?;
    let entry = ShareEntry {
        key: url.clone(),
        kind: ShareKind::Upload,
        expiry,
        created: OffsetDateTime::now_utc(),
        artifact: Artifact::Form { href: form.url.clone(), fields: form.fields.clone() },
    };
    ctx.shares.add(entry).await?;
    match mode {
        OutputMode::Json => println!("{}", serde_json::json!({"url": url, "href": form.url, "fields": form.fields})),
        _ => {
            println!("POST {}", form.url);
            for (name, value) in &form.fields {
                println!("  {name}: {value}");
            }
        },
    }
    Ok(0)
}

pub async fn list(ctx: &Context, mode: OutputMode, kind: Option<ShareKindArg>) -> Result<i32> {
    let now = OffsetDateTime::now_utc();
    let entries = match kind {
        Some(ShareKindArg::Download) => ctx.shares.list(ShareKind::Download, now).await?,
        Some(ShareKindArg::Upload) => ctx.shares.list(ShareKind::Upload, now).await?,
        None => ctx.shares.list_all(now).await?,
    };
    for entry in &entries {
        let remaining = entry.expiry.saturating_sub((now - entry.created).unsigned_abs());
        match mode {
            OutputMode::Json => println!(
                "{}",
                serde_json::json!({"key": entry.key, "kind": entry.kind, "remaining_secs": remaining.as_secs()})
            ),
            _ => println!("{:>8}s remaining  {}", remaining.as_secs(), entry.key),
        }
    }
    Ok(0)
}

pub async fn clear(ctx: &Context) -> Result<i32> {
    ctx.shares.clear().await?;
    Ok(0)
}
