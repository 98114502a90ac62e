//! Running transfer statistics (spec.md §3 "Accounter", §4.8): total and
//! transferred bytes, and a speed estimate over the whole run so far.
//! All mutation is atomic so the background ticker and the worker pool
//! can update the same [`Accounter`] concurrently without a lock.

use haul_storage::ProgressSink;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Default ticker refresh rate (spec.md §4.8).
pub const DEFAULT_REFRESH: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy)]
pub struct AccounterSnapshot {
    pub total: u64,
    pub transferred: u64,
    pub objects_total: u64,
    pub objects_done: u64,
    pub speed_bps: f64,
    pub elapsed: Duration,
}

pub struct Accounter {
    total: AtomicU64,
    transferred: AtomicU64,
    objects_total: AtomicU64,
    objects_done: AtomicU64,
    start: Instant,
}

impl Accounter {
    pub fn new(total: u64, objects_total: u64) -> Arc<Self> {
        Arc::new(Self {
            total: AtomicU64::new(total),
            transferred: AtomicU64::new(0),
            objects_total: AtomicU64::new(objects_total),
            objects_done: AtomicU64::new(0),
            start: Instant::now(),
        })
    }

    pub fn set_total(&self, total: u64, objects_total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.objects_total.store(objects_total, Ordering::Relaxed);
    }

    pub fn add(&self, bytes: u64) {
        self.transferred.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn object_done(&self) {
        self.objects_done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AccounterSnapshot {
        let elapsed = self.start.elapsed();
        let transferred = self.transferred.load(Ordering::Relaxed);
        let speed_bps = if elapsed.as_secs_f64() > 0.0 { transferred as f64 / elapsed.as_secs_f64() } else { 0.0 };
        AccounterSnapshot {
            total: self.total.load(Ordering::Relaxed),
            transferred,
            objects_total: self.objects_total.load(Ordering::Relaxed),
            objects_done: self.objects_done.load(Ordering::Relaxed),
            speed_bps,
            elapsed,
        }
    }
}

/// Adapts an [`Accounter`] to the [`ProgressSink`] seam that `Put`/`Get`
/// tap into (spec.md §4.8).
pub struct AccounterSink(pub Arc<Accounter>);
impl ProgressSink for AccounterSink {
    fn add(&self, bytes: u64) {
        self.0.add(bytes);
    }
}

/// A background ticker publishing snapshots at a fixed refresh rate
/// (spec.md §4.8). Quiet and JSON modes pass a sink that only prints the
/// final snapshot; an interactive run passes one that redraws a bar.
pub async fn run_ticker<F: FnMut(AccounterSnapshot)>(accounter: Arc<Accounter>, refresh: Duration, mut on_tick: F, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(refresh);
    loop {
        tokio::select! {
            _ = interval.tick() => on_tick(accounter.snapshot()),
            _ = shutdown.changed() => {
                on_tick(accounter.snapshot());
                return;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_totals() {
        let accounter = Accounter::new(100, 4);
        accounter.add(40);
        accounter.object_done();
        let snapshot = accounter.snapshot();
        assert_eq!(snapshot.total, 100);
        assert_eq!(snapshot.transferred, 40);
        assert_eq!(snapshot.objects_total, 4);
        assert_eq!(snapshot.objects_done, 1);
    }
}
