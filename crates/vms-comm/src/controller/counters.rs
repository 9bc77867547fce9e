//! Traffic counters shared between the worker and controller handles

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;

/// Live counters; written only by the worker
#[derive(Debug, Default)]
pub struct Counters {
    total: AtomicU64,
    bad: AtomicU64,
    stalled: AtomicBool,
    stall_events: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_valid(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_bad(&self) {
        self.bad.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark the link stalled; true if it was not stalled before
    pub(crate) fn mark_stalled(&self) -> bool {
        let newly = !self.stalled.swap(true, Ordering::Relaxed);
        if newly {
            self.stall_events.fetch_add(1, Ordering::Relaxed);
        }
        newly
    }

    /// Clear the stall flag; true if it was set
    pub(crate) fn clear_stalled(&self) -> bool {
        self.stalled.swap(false, Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn bad(&self) -> u64 {
        self.bad.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            total: self.total(),
            bad: self.bad(),
            stalled: self.stalled.load(Ordering::Relaxed),
            stall_events: self.stall_events.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// Valid messages ingested
    pub total: u64,
    /// Lines that could not be classified
    pub bad: u64,
    /// No valid message arrived during the last health check interval
    pub stalled: bool,
    /// Number of times the link went from healthy to stalled
    pub stall_events: u64,
}

impl CounterSnapshot {
    /// Lines ingested since the controller was created
    pub fn ingested(&self) -> u64 {
        self.total + self.bad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let counters = Counters::new();
        counters.record_valid();
        counters.record_valid();
        counters.record_bad();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.total, 2);
        assert_eq!(snapshot.bad, 1);
        assert_eq!(snapshot.ingested(), 3);
    }

    #[test]
    fn test_stall_transitions() {
        let counters = Counters::new();
        assert!(counters.mark_stalled());
        assert!(!counters.mark_stalled());
        assert!(counters.snapshot().stalled);
        assert!(counters.clear_stalled());
        assert!(!counters.clear_stalled());
        assert!(counters.mark_stalled());
        assert_eq!(counters.snapshot().stall_events, 2);
    }
}
