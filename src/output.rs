//! Progress reporting (spec.md §4.8): an animated single-line bar for
//! interactive runs, a silent accounter for `--quiet`/`--json` that only
//! emits one machine-readable summary at the end. The actual terminal
//! rendering (colors, multi-line redraw) is the external progress-bar
//! renderer named out of scope in spec.md §1 — this is the thin sink it
//! would be wired into.

use haul_transfer::{Accounter, AccounterSnapshot, DEFAULT_REFRESH};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Interactive,
    Quiet,
    Json,
}

impl OutputMode {
    pub fn from_flags(quiet: bool, json: bool) -> Self {
        if json {
            Self::Json
        } else if quiet {
            Self::Quiet
        } else {
            Self::Interactive
        }
    }
}

fn render_line(snapshot: &AccounterSnapshot) {
    let pct = if snapshot.total > 0 { (snapshot.transferred as f64 / snapshot.total as f64) * 100.0 } else { 100.0 };
    eprint!(
        "\r{:>3.0}%  {}/{} objects  {} / {} bytes  {:.1} MiB/s   ",
        pct,
        snapshot.objects_done,
        snapshot.objects_total,
        snapshot.transferred,
        snapshot.total,
        snapshot.speed_bps / (1024.0 * 1024.0)
    );
    let _ = std::io::stderr().flush();
}

/// Spawn the background ticker (spec.md §4.8 "fixed refresh rate").
/// Returns a shutdown sender and the ticker's join handle; drop the
/// sender (or send `true`) to stop it before printing the final summary.
pub fn spawn_ticker(accounter: Arc<Accounter>, mode: OutputMode) -> (watch::Sender<bool>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        haul_transfer::accounter::run_ticker(
            accounter,
            DEFAULT_REFRESH,
            move |snapshot| {
                if mode == OutputMode::Interactive {
                    render_line(&snapshot);
                }
            },
            rx,
        )
        .await;
    });
    (tx, handle)
}

/// Final one-line summary, printed once after the ticker stops
/// regardless of mode (spec.md §4.8 "emits one machine-readable summary
/// at end" for quiet/json; interactive mode gets the same line after
/// clearing its last redraw).
pub fn print_summary(mode: OutputMode, completed: u64, skipped: u64, bytes: u64) {
    match mode {
        OutputMode::Json => {
            println!("{}", serde_json::json!({"status": "success", "completed": completed, "skipped": skipped, "bytes": bytes}));
        },
        OutputMode::Interactive => {
            eprintln!();
            println!("{completed} object(s) transferred, {skipped} skipped, {bytes} bytes");
        },
        OutputMode::Quiet => {
            println!("{completed} object(s) transferred, {skipped} skipped, {bytes} bytes");
        },
    }
}

pub fn print_error(mode: OutputMode, err: &crate::error::AppError) {
    match mode {
        OutputMode::Json => {
            eprintln!("{}", serde_json::json!({"status": "error", "error": {"kind": err.kind_tag(), "message": err.user_message()}}));
        },
        _ => {
            eprintln!("haul: {}", err.user_message());
        },
    }
}
