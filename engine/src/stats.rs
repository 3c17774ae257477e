//! The stats object (spec §4.4 "Stats", §5 "Shared state"): the only
//! mutable object shared across concurrent checksum/download tasks.
//! Every update is a single counter increment, so atomics are used
//! instead of a lock.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct DiffStats {
    table1_count: AtomicU64,
    table2_count: AtomicU64,
    rows_downloaded: AtomicU64,
    segments_checksummed: AtomicU64,
    segments_downloaded: AtomicU64,
}

/// A point-in-time, non-atomic copy for reporting alongside or after the
/// diff stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStatsSnapshot {
    pub table1_count: u64,
    pub table2_count: u64,
    pub rows_downloaded: u64,
    pub segments_checksummed: u64,
    pub segments_downloaded: u64,
}

impl DiffStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_top_level_counts(&self, table1_count: u64, table2_count: u64) {
        self.table1_count.store(table1_count, Ordering::Relaxed);
        self.table2_count.store(table2_count, Ordering::Relaxed);
    }

    pub fn add_rows_downloaded(&self, n: u64) {
        self.rows_downloaded.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_segments_checksummed(&self) {
        self.segments_checksummed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_segments_downloaded(&self) {
        self.segments_downloaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiffStatsSnapshot {
        DiffStatsSnapshot {
            table1_count: self.table1_count.load(Ordering::Relaxed),
            table2_count: self.table2_count.load(Ordering::Relaxed),
            rows_downloaded: self.rows_downloaded.load(Ordering::Relaxed),
            segments_checksummed: self.segments_checksummed.load(Ordering::Relaxed),
            segments_downloaded: self.segments_downloaded.load(Ordering::Relaxed),
        }
    }
}
