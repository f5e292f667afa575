//! Phase timing for index builds
//!
//! Every builder thread of a chunk records into one shared [`PhaseTimings`].
//! A phase is timed by holding the guard returned by [`PhaseTimings::time`];
//! the elapsed time is added when the guard drops, so nested or interleaved
//! phases need no suspend/resume bookkeeping.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Timed phases of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Batched side-table queries for a chunk
    LoadSideMaps,
    /// Primary row queries
    FetchRows,
    /// Turning rows into documents, store serialization included
    BuildDocuments,
    /// Serializing store blobs
    SerializeStore,
    /// Writer commits
    Commit,
}

impl Phase {
    const ALL: [Phase; 5] = [
        Phase::LoadSideMaps,
        Phase::FetchRows,
        Phase::BuildDocuments,
        Phase::SerializeStore,
        Phase::Commit,
    ];

    fn slot(self) -> usize {
        match self {
            Phase::LoadSideMaps => 0,
            Phase::FetchRows => 1,
            Phase::BuildDocuments => 2,
            Phase::SerializeStore => 3,
            Phase::Commit => 4,
        }
    }

    /// Name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Phase::LoadSideMaps => "load_side_maps",
            Phase::FetchRows => "fetch_rows",
            Phase::BuildDocuments => "build_documents",
            Phase::SerializeStore => "serialize_store",
            Phase::Commit => "commit",
        }
    }
}

/// Accumulated wall time per phase, shared across threads.
#[derive(Debug, Default)]
pub struct PhaseTimings {
    nanos: [AtomicU64; 5],
}

impl PhaseTimings {
    /// All phases at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing `phase` until the guard drops.
    #[must_use = "the phase is timed until the guard is dropped"]
    pub fn time(&self, phase: Phase) -> PhaseGuard<'_> {
        PhaseGuard {
            timings: self,
            phase,
            started: Instant::now(),
        }
    }

    /// Add `elapsed` to `phase`.
    pub fn record(&self, phase: Phase, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.nanos[phase.slot()].fetch_add(nanos, Ordering::Relaxed);
    }

    /// Point-in-time copy of the totals.
    pub fn snapshot(&self) -> TimingReport {
        let mut totals = [Duration::ZERO; 5];
        for phase in Phase::ALL {
            totals[phase.slot()] =
                Duration::from_nanos(self.nanos[phase.slot()].load(Ordering::Relaxed));
        }
        TimingReport { totals }
    }
}

/// Adds the time since creation to one phase when dropped.
#[derive(Debug)]
pub struct PhaseGuard<'a> {
    timings: &'a PhaseTimings,
    phase: Phase,
    started: Instant,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.timings.record(self.phase, self.started.elapsed());
    }
}

/// Totals per phase at the end of an index build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingReport {
    totals: [Duration; 5],
}

impl TimingReport {
    /// Total time spent in `phase`.
    pub fn get(&self, phase: Phase) -> Duration {
        self.totals[phase.slot()]
    }
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, phase) in Phase::ALL.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={:.3}s", phase.name(), self.get(*phase).as_secs_f64())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_records_on_drop() {
        let timings = PhaseTimings::new();
        {
            let _g = timings.time(Phase::FetchRows);
            std::thread::sleep(Duration::from_millis(2));
        }
        let report = timings.snapshot();
        assert!(report.get(Phase::FetchRows) >= Duration::from_millis(2));
        assert_eq!(report.get(Phase::Commit), Duration::ZERO);
    }

    #[test]
    fn test_record_accumulates_across_threads() {
        let timings = PhaseTimings::new();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| timings.record(Phase::BuildDocuments, Duration::from_millis(5)));
            }
        });
        assert_eq!(
            timings.snapshot().get(Phase::BuildDocuments),
            Duration::from_millis(20)
        );
    }

    #[test]
    fn test_display_lists_every_phase() {
        let timings = PhaseTimings::new();
        timings.record(Phase::SerializeStore, Duration::from_millis(1500));
        let text = timings.snapshot().to_string();
        assert!(text.contains("serialize_store=1.500s"));
        assert!(text.starts_with("load_side_maps="));
    }
}
