//! `mirror` (spec.md §4.5): diff-driven sync. Schedules transfers through
//! the same durable session + transfer engine as `cp`; `type-differs` is
//! always a conflict, `size-differs` only without `--force`, and
//! `only-in-second` is never touched.

use crate::backend;
use crate::context::Context;
use crate::error::{AppError, Result};
use crate::output::{self, OutputMode};
use futures::StreamExt;
use haul_transfer::{Accounter, BackendResolver, PlanStream, TransferEngine, default_concurrency, plan_mirror};
use tokio::sync::watch;

pub async fn run(ctx: &Context, mode: OutputMode, force: bool, source_raw: String, target_raw: String) -> Result<i32> {
    let source = backend::resolve(ctx, &source_raw).await?;
    let target = backend::resolve(ctx, &target_raw).await?;

    let mirror_stream = plan_mirror(source.backend.clone(), target.backend.clone(), force);
    let plan_stream: PlanStream = Box::pin(mirror_stream.filter_map(move |item| async move {
        match item {
            Ok(haul_transfer::MirrorItem::Transfer(plan_item)) => Some(Ok(plan_item)),
            Ok(haul_transfer::MirrorItem::Conflict(conflict)) => {
                eprintln!("conflict: {} ({:?}) — not overwritten", conflict.key, conflict.classification);
                None
            },
            Err(err) => Some(Err(err)),
        }
    }));

    let flags = serde_json::json!({"force": force});
    let cwd = std::env::current_dir().map_err(AppError::from)?;
    let session = ctx.sessions.create("mirror", vec![source_raw, target_raw], flags, cwd).await?;

    let engine = TransferEngine::new(default_concurrency());
    let session = engine.enumerate(session, plan_stream).await?;

    if session.header.total_objects == 0 {
        session.delete().await?;
        output::print_summary(mode, 0, 0, 0);
        return Ok(0);
    }

    let accounter = Accounter::new(session.header.total_bytes, session.header.total_objects);
    let (ticker_tx, ticker_handle) = output::spawn_ticker(accounter.clone(), mode);
    let (interrupt_tx, interrupt_rx) = watch::channel(false);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt_tx.send(true);
        }
    });

    let resolver: BackendResolver = backend::resolver_for(vec![source.backend]);
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
