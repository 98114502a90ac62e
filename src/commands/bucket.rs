//! `mb` / `rb` (spec.md §6 "make-bucket"/"remove-bucket").

use crate::backend;
use crate::context::Context;
use crate::error::Result;
use crate::output::OutputMode;

pub async fn make(ctx: &Context, mode: OutputMode, url: String, region: Option<String>) -> Result<i32> {
    let resolved = backend::resolve(ctx, &url).await?;
    resolved.backend.make_bucket(region.as_deref()).await?;
    match mode {
        OutputMode::Json => println!("{}", serde_json::json!({"status": "success", "url": url})),
        _ => println!("bucket created: {url}"),
    }
    Ok(0)
}

pub async fn remove(ctx: &Context, mode: OutputMode, url: String, force: bool) -> Result<i32> {
    let resolved = backend::resolve(ctx, &url).await?;
    resolved.backend.remove_bucket(force).await?;
    match mode {
        OutputMode::Json => println!("{}", serde_json::json!({"status": "success", "url": url})),
        _ => println!("bucket removed: {url}"),
    }
    Ok(0)
}
