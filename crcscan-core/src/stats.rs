use std::{fmt, time::Duration};

use humansize::{format_size, BINARY};

/// Counters owned by a single worker for its whole lifetime.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerStats {
    pub files: u64,
    pub bytes: u64,
}

impl WorkerStats {
    #[inline]
    pub fn record(&mut self, size: u64) {
        self.files += 1;
        self.bytes += size;
    }

    #[inline]
    pub fn absorb(&mut self, other: WorkerStats) {
        self.files += other.files;
        self.bytes += other.bytes;
    }
}

/// Totals for one pipeline run, summed after every worker has finished.
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub duration: Duration,
    pub files: u64,
    pub bytes: u64,
    pub errors: u64,
    pub backpressure_waits: u64,
    pub per_worker: Vec<WorkerStats>,
}

impl RunSummary {
    pub fn aggregate(per_worker: Vec<WorkerStats>, duration: Duration, errors: u64) -> Self {
        let (files, bytes) = per_worker
            .iter()
            .fold((0u64, 0u64), |acc, s| (acc.0 + s.files, acc.1 + s.bytes));
        Self {
            duration,
            files,
            bytes,
            errors,
            backpressure_waits: 0,
            per_worker,
        }
    }

    pub fn mib_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        (self.bytes as f64 / (1024.0 * 1024.0)) / secs
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Duration: {:?}] [Files processed: {}] [Bytes processed: {} ({})] [Errors: {}] [{:.2} MiB/second]",
            self.duration,
            self.files,
            self.bytes,
            format_size(self.bytes, BINARY),
            self.errors,
            self.mib_per_second()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_worker_slots() {
        let mut a = WorkerStats::default();
        a.record(10);
        a.record(20);
        let mut b = WorkerStats::default();
        b.record(1 << 20);
        let s = RunSummary::aggregate(vec![a, b, WorkerStats::default()], Duration::from_secs(2), 1);
        assert_eq!(s.files, 3);
        assert_eq!(s.bytes, 30 + (1 << 20));
        assert_eq!(s.per_worker.len(), 3);
        assert!((s.mib_per_second() - (s.bytes as f64 / 1048576.0 / 2.0)).abs() < 1e-9);
    }

    #[test]
    fn zero_duration_has_zero_throughput() {
        let s = RunSummary::aggregate(vec![], Duration::ZERO, 0);
        assert_eq!(s.mib_per_second(), 0.0);
        let text = s.to_string();
        assert!(text.contains("[Files processed: 0]"));
        assert!(text.contains("[0.00 MiB/second]"));
    }
}
