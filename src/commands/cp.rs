//! `cp` (spec.md §4.1, §4.3): classify the (sources, target) tuple,
//! enumerate into a session, then execute through the bounded worker
//! pool.

use crate::backend;
use crate::context::Context;
use crate::error::{AppError, Result};
use crate::output::{self, OutputMode};
use haul_transfer::{Accounter, BackendResolver, PlannedSource, TransferEngine, default_concurrency, plan};
use std::sync::Arc;
use tokio::sync::watch;

pub async fn run(ctx: &Context, mode: OutputMode, recursive: bool, mut paths: Vec<String>) -> Result<i32> {
    let target_raw = paths.pop().expect("clap enforces at least 2 paths");
    let source_raws = paths;

    let target = backend::resolve(ctx, &target_raw).await?;
    let mut planned = Vec::with_capacity(source_raws.len());
    let mut resolver_backends = Vec::with_capacity(source_raws.len());
    for raw in &source_raws {
        let resolved = backend::resolve(ctx, raw).await?;
        resolver_backends.push(resolved.backend.clone());
        planned.push(PlannedSource { backend: resolved.backend, recursive: recursive || resolved.recursive });
    }

    let plan_stream = plan(planned, target.backend.clone());

    let flags = serde_json::json!({"recursive": recursive});
    let args: Vec<String> = source_raws.iter().cloned().chain(std::iter::once(target_raw.clone())).collect();
    let cwd = std::env::current_dir().map_err(AppError::from)?;
    let session = ctx.sessions.create("cp", args, flags, cwd).await?;

    let engine = TransferEngine::new(default_concurrency());
    let session = engine.enumerate(session, plan_stream).await?;

    let accounter = Accounter::new(session.header.total_bytes, session.header.total_objects);
    let (ticker_tx, ticker_handle) = output::spawn_ticker(accounter.clone(), mode);
    let (interrupt_tx, interrupt_rx) = watch::channel(false);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt_tx.send(true);
        }
    });

    let resolver: BackendResolver = backend::resolver_for(resolver_backends);
    let session_id = session.id().clone();
    let outcome = engine.execute(session, resolver, target.backend, accounter.clone(), interrupt_rx).await?;

    ctrl_c.abort();
    let _ = ticker_tx.send(true);
    let _ = ticker_handle.await;

    if outcome.interrupted {
        eprintln!("session safely terminated; resume with haul session resume {session_id}");
        return Ok(0);
    }
    if let Some(fatal) = outcome.fatal {
        output::print_error(mode, &AppError::Transfer(fatal));
        eprintln!("session preserved; resume with haul session resume {session_id}");
        return Ok(1);
    }

    output::print_summary(mode, outcome.completed, outcome.skipped, outcome.bytes);
    Ok(0)
}
