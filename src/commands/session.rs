//! `session` (spec.md §4.6): list, resume, and clear durable sessions.
//! `resume` changes into the session's captured `root_path` before
//! re-invoking the transfer engine, then restores the prior working
//! directory regardless of outcome.

use crate::backend;
use crate::context::Context;
use crate::error::{AppError, Result};
use crate::output::{self, OutputMode};
use haul_session::{Session, SessionId};
use haul_transfer::{Accounter, BackendResolver, TransferEngine, default_concurrency};
use haul_storage::BackendHandle;
use std::str::FromStr;
use tokio::sync::watch;

pub async fn list(ctx: &Context, mode: OutputMode) -> Result<i32> {
    let summaries = ctx.sessions.list().await?;
    for summary in &summaries {
        match mode {
            OutputMode::Json => println!(
                "{}",
                serde_json::json!({
                    "id": summary.id.to_string(),
                    "command": summary.command,
                    "created": summary.created.to_string(),
                    "total_bytes": summary.total_bytes,
                    "total_objects": summary.total_objects,
                    "resumable": summary.resumable,
                })
            ),
            _ => println!(
                "{}  {:<8} {:>6} objects  {:>10} bytes  {}",
                summary.id,
                summary.command,
                summary.total_objects,
                summary.total_bytes,
                if summary.resumable { "resumable" } else { "stale" }
            ),
        }
    }
    Ok(0)
}

/// Re-resolve the backends a session's captured command needs, the same
/// way `cp`/`mirror` resolved them the first time round.
async fn resolver_and_target(ctx: &Context, session: &Session) -> Result<(BackendResolver, BackendHandle)> {
    match session.header.command.as_str() {
        "cp" => {
            let args = &session.header.command_args;
            let (target_raw, source_raws) =
                args.split_last().ok_or_else(|| AppError::Message("corrupt session: no arguments recorded".to_string()))?;
            let target = backend::resolve(ctx, target_raw).await?;
            let mut resolver_backends = Vec::with_capacity(source_raws.len());
            for raw in source_raws {
                let resolved = backend::resolve(ctx, raw).await?;
                resolver_backends.push(resolved.backend);
            }
            Ok((backend::resolver_for(resolver_backends), target.backend))
        },
        "mirror" => {
            let args = &session.header.command_args;
            if args.len() != 2 {
                return Err(AppError::Message("corrupt session: mirror expects exactly 2 arguments".to_string()));
            }
            let source = backend::resolve(ctx, &args[0]).await?;
            let target = backend::resolve(ctx, &args[1]).await?;
            Ok((backend::resolver_for(vec![source.backend]), target.backend))
        },
        other => Err(AppError::Message(format!("cannot resume a {other:?} session"))),
    }
}

pub async fn resume(ctx: &Context, mode: OutputMode, id: String) -> Result<i32> {
    let session_id = SessionId::from_str(&id).expect("SessionId parsing is infallible");
    let session = ctx.sessions.load(&session_id).await?;
    let (resolver, target_backend) = resolver_and_target(ctx, &session).await?;

    let prior_cwd = std::env::current_dir().map_err(AppError::from)?;
    std::env::set_current_dir(&session.header.root_path).map_err(AppError::from)?;
    let outcome = run_resumed(session, resolver, target_backend, mode).await;
    let _ = std::env::set_current_dir(&prior_cwd);
    outcome
}

async fn run_resumed(session: Session, resolver: BackendResolver, target_backend: BackendHandle, mode: OutputMode) -> Result<i32> {
    let accounter = Accounter::new(session.header.total_bytes, session.header.total_objects);
    let (ticker_tx, ticker_handle) = output::spawn_ticker(accounter.clone(), mode);
    let (interrupt_tx, interrupt_rx) = watch::channel(false);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt_tx.send(true);
        }
    });

    let engine = TransferEngine::new(default_concurrency());
    let session_id = session.id().clone();
    let outcome = engine.execute(session, resolver, target_backend, accounter.clone(), interrupt_rx).await?;

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

pub async fn clear(ctx: &Context, mode: OutputMode, id: String) -> Result<i32> {
    if id == "all" {
        let cleared = ctx.sessions.clear_all().await?;
        match mode {
            OutputMode::Json => println!("{}", serde_json::json!({"status": "success", "cleared": cleared})),
            _ => println!("{cleared} session(s) cleared"),
        }
        return Ok(0);
    }
    let session_id = SessionId::from_str(&id).expect("SessionId parsing is infallible");
    let session = ctx.sessions.load(&session_id).await?;
    session.delete().await?;
    match mode {
        OutputMode::Json => println!("{}", serde_json::json!({"status": "success", "cleared": 1})),
        _ => println!("session {id} cleared"),
    }
    Ok(0)
}
