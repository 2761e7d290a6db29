//! Engine-lifetime outcome counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::models::OutcomeKind;

/// Lock-free counters shared by every upsert an engine performs.
#[derive(Debug, Default)]
pub struct UpsertStatistics {
    inserts: AtomicU64,
    updates: AtomicU64,
    skips: AtomicU64,
    conflicts: AtomicU64,
    errors: AtomicU64,
    elapsed_us: AtomicU64,
}

impl UpsertStatistics {
    pub fn record(&self, kind: OutcomeKind, elapsed: Duration) {
        let counter = match kind {
            OutcomeKind::Insert => &self.inserts,
            OutcomeKind::Update => &self.updates,
            OutcomeKind::Skip => &self.skips,
            OutcomeKind::Conflict => &self.conflicts,
            OutcomeKind::Failure => &self.errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.elapsed_us.fetch_add(micros, Ordering::Relaxed);
    }

    /// Move one already-counted outcome to the error bucket. Used when a
    /// batch is rolled back after some of its outcomes were tallied.
    pub fn reclassify_as_error(&self, kind: OutcomeKind) {
        let counter = match kind {
            OutcomeKind::Insert => &self.inserts,
            OutcomeKind::Update => &self.updates,
            OutcomeKind::Skip => &self.skips,
            OutcomeKind::Conflict => &self.conflicts,
            OutcomeKind::Failure => return,
        };
        // Saturating decrement; a concurrent reset may have zeroed it.
        let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
            Some(v.saturating_sub(1))
        });
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            skips: self.skips.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            elapsed: Duration::from_micros(self.elapsed_us.load(Ordering::Relaxed)),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.inserts,
            &self.updates,
            &self.skips,
            &self.conflicts,
            &self.errors,
            &self.elapsed_us,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time copy of [`UpsertStatistics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    pub inserts: u64,
    pub updates: u64,
    pub skips: u64,
    pub conflicts: u64,
    pub errors: u64,
    pub elapsed: Duration,
}

impl StatisticsSnapshot {
    pub fn total(&self) -> u64 {
        self.inserts + self.updates + self.skips + self.conflicts + self.errors
    }
}
