//! Two-phase enumerate/execute transfer pipeline (spec.md §4.3), the
//! mirror engine built on top of it (§4.5), and the accounter/progress
//! plumbing that drives the CLI's progress bar (§4.8).

pub mod accounter;
pub mod engine;
pub mod error;
pub mod mirror;
pub mod plan;
pub mod progress;

pub use crate::accounter::{Accounter, AccounterSink, AccounterSnapshot, DEFAULT_REFRESH};
pub use crate::engine::{BackendResolver, EngineOutcome, TransferEngine, default_concurrency};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::mirror::{MirrorConflict, MirrorItem, MirrorStream, plan_mirror};
pub use crate::plan::{PlanItem, PlanStream, PlannedSource, plan};
pub use crate::progress::ProgressReader;
