//! `cat` / `pipe` (spec.md §6): stream an object to stdout, or stdin to
//! an object, through the same `Get`/`Put` contract transfers use — just
//! without a session, since a single piped stream has nothing to resume.

use crate::backend;
use crate::context::Context;
use crate::error::{AppError, Result};
use std::path::Path;
use tokio::io::AsyncWriteExt;

pub async fn cat(ctx: &Context, url: String) -> Result<i32> {
    let resolved = backend::resolve(ctx, &url).await?;
    let mut reader = resolved.backend.get(Path::new("")).await?;
    let mut stdout = tokio::io::stdout();
    tokio::io::copy(&mut reader, &mut stdout).await.map_err(AppError::from)?;
    stdout.flush().await.map_err(AppError::from)?;
    Ok(0)
}

pub async fn pipe(ctx: &Context, url: String) -> Result<i32> {
    let resolved = backend::resolve(ctx, &url).await?;
    let mut buf = Vec::new();
    tokio::io::copy(&mut tokio::io::stdin(), &mut buf).await.map_err(AppError::from)?;
    let size = buf.len() as u64;
    let reader: haul_storage::backend::BoxAsyncRead = Box::pin(std::io::Cursor::new(buf));
    resolved.backend.put(Path::new(""), reader, size, None, std::sync::Arc::new(haul_storage::NullProgress)).await?;
    Ok(0)
}
