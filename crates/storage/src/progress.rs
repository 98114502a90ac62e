//! The minimal interface `Put`/`Get` need to report progress without
//! this crate depending on the accounter/progress-bar implementation in
//! `haul-transfer` (which in turn depends on this crate for `Content`).

use std::sync::Arc;

pub trait ProgressSink: Send + Sync {
    fn add(&self, bytes: u64);
}

#[derive(Clone, Default)]
pub struct NullProgress;
impl ProgressSink for NullProgress {
    fn add(&self, _bytes: u64) {}
}

pub type ProgressTap = Arc<dyn ProgressSink>;
