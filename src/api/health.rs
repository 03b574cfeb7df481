//! Host-level liveness for the /health endpoint.
//! Updated by MarketMonitor, read by the API.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};

#[derive(Default)]
pub struct HostHealth {
    /// True while a market cycle is fetching / publishing.
    cycle_running: AtomicBool,
    cycles_completed: AtomicU64,
    /// Unix millis of the last completed cycle (0 = none).
    last_cycle_at_ms: AtomicI64,
    /// Opportunity batches evaluated since startup.
    batches_evaluated: AtomicU64,
}

impl HostHealth {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_cycle_running(&self, v: bool) {
        self.cycle_running.store(v, Ordering::Relaxed);
    }

    /// Marks a cycle as running until the returned guard is dropped, so a
    /// cancelled cycle still clears the flag.
    pub fn cycle_running_guard(&self) -> CycleRunning<'_> {
        self.set_cycle_running(true);
        CycleRunning(self)
    }

    pub fn record_cycle(&self, at: DateTime<Utc>) {
        self.last_cycle_at_ms.store(at.timestamp_millis(), Ordering::Relaxed);
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_batches_evaluated(&self) {
        self.batches_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycle_running(&self) -> bool {
        self.cycle_running.load(Ordering::Relaxed)
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Relaxed)
    }

    pub fn last_cycle_at(&self) -> Option<DateTime<Utc>> {
        match self.last_cycle_at_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    pub fn batches_evaluated(&self) -> u64 {
        self.batches_evaluated.load(Ordering::Relaxed)
    }
}

pub struct CycleRunning<'a>(&'a HostHealth);

impl Drop for CycleRunning<'_> {
    fn drop(&mut self) {
        self.0.set_cycle_running(false);
    }
}
