//! Remembered-set scan statistics.
//!
//! Every scan returns a [`ScanSummary`]; a heap folds summaries into
//! [`RemsetStats`] for monitoring and tuning.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Outcome of one remembered-set scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Regions that had a table to scan.
    pub regions_scanned: usize,
    /// Slots handed to the callback.
    pub slots_visited: usize,
    /// Slots still recorded afterwards.
    pub slots_retained: usize,
    /// Tables released because they ended up empty.
    pub tables_released: usize,
    /// Wall time of the scan.
    pub elapsed: Duration,
}

impl ScanSummary {
    /// Slots dropped by the scan.
    #[inline]
    pub fn slots_removed(&self) -> usize {
        self.slots_visited - self.slots_retained
    }
}

/// Cumulative statistics across scans.
#[derive(Debug)]
pub struct RemsetStats {
    /// Number of scans.
    pub scans: AtomicU64,
    /// Total slots visited.
    pub slots_visited: AtomicU64,
    /// Total slots retained.
    pub slots_retained: AtomicU64,
    /// Total tables released on empty.
    pub tables_released: AtomicU64,
    /// Total time spent scanning (nanoseconds).
    pub scan_time_ns: AtomicU64,
}

impl RemsetStats {
    /// Create new empty statistics.
    pub const fn new() -> Self {
        Self {
            scans: AtomicU64::new(0),
            slots_visited: AtomicU64::new(0),
            slots_retained: AtomicU64::new(0),
            tables_released: AtomicU64::new(0),
            scan_time_ns: AtomicU64::new(0),
        }
    }

    /// Record a scan.
    pub fn record_scan(&self, summary: &ScanSummary) {
        self.scans.fetch_add(1, Ordering::Relaxed);
        self.slots_visited
            .fetch_add(summary.slots_visited as u64, Ordering::Relaxed);
        self.slots_retained
            .fetch_add(summary.slots_retained as u64, Ordering::Relaxed);
        self.tables_released
            .fetch_add(summary.tables_released as u64, Ordering::Relaxed);
        self.scan_time_ns
            .fetch_add(summary.elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Average scan time.
    pub fn avg_scan_time(&self) -> Duration {
        let count = self.scans.load(Ordering::Relaxed);
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.scan_time_ns.load(Ordering::Relaxed) / count)
    }

    /// Fraction of visited slots that survived, over all scans.
    pub fn retention_ratio(&self) -> f64 {
        let visited = self.slots_visited.load(Ordering::Relaxed);
        if visited == 0 {
            return 0.0;
        }
        self.slots_retained.load(Ordering::Relaxed) as f64 / visited as f64
    }

    /// Reset all statistics.
    pub fn reset(&self) {
        self.scans.store(0, Ordering::Relaxed);
        self.slots_visited.store(0, Ordering::Relaxed);
        self.slots_retained.store(0, Ordering::Relaxed);
        self.tables_released.store(0, Ordering::Relaxed);
        self.scan_time_ns.store(0, Ordering::Relaxed);
    }
}

impl Default for RemsetStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer for measuring scans.
pub struct ScanTimer {
    start: Instant,
}

impl ScanTimer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Stop the timer and return the elapsed duration.
    pub fn stop(self) -> Duration {
        self.start.elapsed()
    }
}
