#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use anyhow::{anyhow, Context, Result};

pub mod checksum;
mod common_ops;
pub mod constants;
mod error_handling;
mod options; // for OptionsBuilder
pub mod scheduler;
mod scanner; // FileSystemScanner + platform default
mod selftest;
pub mod sink;
mod stats;
mod walker;
mod worker;

pub use checksum::{Checksum, ChecksumTable};
pub use error_handling::{EntryKind, ErrorRecovery, RecoveryAction, ScanError, ScanResult};
pub use options::OptionsBuilder;
pub use scanner::{platform_scanner, FileSystemScanner, PlatformScanner, WalkContext};
pub use scheduler::{work_queue, Job, JobReceiver, JobSender, QueueClosed, QueueStats};
pub use selftest::verify_table;
pub use sink::{ResultSink, StdoutSink, WriterSink};
pub use stats::{RunSummary, WorkerStats};

/// Something the diagnostic stream should hear about.
#[derive(Debug)]
pub enum ScanEvent {
    /// the walker descended into a directory
    EnterDir(PathBuf),
    /// symlink, device, socket or other non-regular entry
    Ignored(PathBuf),
    /// a recoverable per-entry or per-file failure
    Error(ScanError),
    Summary(RunSummary),
}

pub type EventReporter = Arc<dyn Fn(&ScanEvent) + Send + Sync + 'static>;

#[derive(Clone)]
pub struct Options {
    pub workers: usize,     // J: concurrent checksum workers
    pub queue_depth: usize, // L: list-ahead capacity of the work queue
    pub buffer_size: usize, // S: per-worker read buffer in bytes
    pub cpu_cap: Option<usize>, // P: restrict workers to the first P CPUs (Linux)
    pub batch_lines: usize, // result lines per flush
    pub event_report: Option<EventReporter>, // optional diagnostic sink; falls back to `log`
    pub error_count: Arc<AtomicU64>,
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("workers", &self.workers)
            .field("queue_depth", &self.queue_depth)
            .field("buffer_size", &self.buffer_size)
            .field("cpu_cap", &self.cpu_cap)
            .field("batch_lines", &self.batch_lines)
            .finish()
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl Default for Options {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let workers = env_usize("CRCSCAN_WORKERS")
            .unwrap_or(cpus * constants::pipeline::WORKERS_PER_CPU)
            .max(1);
        Self {
            workers,
            queue_depth: env_usize("CRCSCAN_QUEUE_DEPTH").unwrap_or(workers).max(1),
            buffer_size: env_usize("CRCSCAN_BUFFER_KB")
                .unwrap_or(constants::pipeline::DEFAULT_BUFFER_KB)
                .clamp(1, constants::pipeline::MAX_BUFFER_KB)
                * 1024,
            cpu_cap: env_usize("CRCSCAN_CPUS").filter(|&n| n > 0),
            batch_lines: constants::pipeline::BATCH_LINES,
            event_report: None,
            error_count: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Explicit pipeline context: the options plus the checksum table every
/// worker shares read-only. Construction runs the startup self-test.
pub struct Pipeline {
    options: Arc<Options>,
    table: Arc<ChecksumTable>,
}

impl Pipeline {
    pub fn new(options: Options) -> ScanResult<Self> {
        let table = ChecksumTable::castagnoli();
        selftest::verify_table(&table)?;
        Ok(Self {
            options: Arc::new(options),
            table: Arc::new(table),
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn table(&self) -> &ChecksumTable {
        &self.table
    }

    pub fn run<P: AsRef<Path>>(&self, roots: &[P], sink: Arc<dyn ResultSink>) -> Result<RunSummary> {
        self.run_with(roots, Arc::new(platform_scanner()), sink)
    }

    /// Variant of `run` that accepts a custom scanner implementation.
    /// Useful for unit tests and alternative backends.
    pub fn run_with<P: AsRef<Path>>(
        &self,
        roots: &[P],
        scanner: Arc<dyn FileSystemScanner>,
        sink: Arc<dyn ResultSink>,
    ) -> Result<RunSummary> {
        let opt = &self.options;
        let workers = opt.workers.max(1);
        let errors_before = opt.error_count.load(Ordering::Relaxed);
        if opt.cpu_cap.is_some() && !common_ops::PINNING_SUPPORTED {
            log::warn!("cpu cap is not supported on this platform; ignoring");
        }

        let start = Instant::now();
        let (queue, jobs) = scheduler::work_queue(opt.queue_depth);
        let halt = Arc::new(AtomicBool::new(false));

        // Workers start before the walk so the queue drains from the first push.
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let ctx = worker::WorkerContext {
                options: Arc::clone(opt),
                table: Arc::clone(&self.table),
                jobs: jobs.clone(),
                sink: Arc::clone(&sink),
                halt: Arc::clone(&halt),
            };
            let handle = std::thread::Builder::new()
                .name(format!("crcscan-worker-{id}"))
                .spawn(move || worker::run_worker(id, ctx))
                .with_context(|| format!("spawning worker {id}"))?;
            handles.push(handle);
        }
        drop(jobs);

        let walked = {
            let ctx = WalkContext {
                options: opt,
                queue: &queue,
            };
            roots
                .iter()
                .try_for_each(|root| scanner.walk_root(&ctx, root.as_ref()))
        };
        let queue_stats = queue.stats();
        queue.close();

        // Join barrier: each worker's stats land in its own slot.
        let mut per_worker = vec![WorkerStats::default(); workers];
        let mut panicked = 0usize;
        for (id, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(stats) => per_worker[id] = stats,
                Err(_) => {
                    log::error!("worker {id} panicked");
                    panicked += 1;
                }
            }
        }
        walked?;
        if panicked > 0 {
            return Err(anyhow!("{panicked} worker(s) panicked"));
        }
        if halt.load(Ordering::Relaxed) {
            return Err(anyhow!("writing results failed; the inventory is incomplete"));
        }

        log::debug!(
            "queue: {} enqueued, {} dequeued, {} backpressure waits",
            queue_stats.enqueued(),
            queue_stats.dequeued(),
            queue_stats.backpressure_count()
        );
        let mut summary = RunSummary::aggregate(
            per_worker,
            start.elapsed(),
            opt.error_count.load(Ordering::Relaxed) - errors_before,
        );
        summary.backpressure_waits = queue_stats.backpressure_count();
        common_ops::report_event(opt, &ScanEvent::Summary(summary.clone()));
        Ok(summary)
    }
}

/// Self-test, walk `roots`, checksum every regular file into `sink`.
pub fn run<P: AsRef<Path>>(roots: &[P], opt: Options, sink: Arc<dyn ResultSink>) -> Result<RunSummary> {
    Pipeline::new(opt)?.run(roots, sink)
}
