use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{
    checksum::{checksum_file, ChecksumTable},
    common_ops::pin_current_thread,
    error_handling::{record_error, ScanError},
    scheduler::JobReceiver,
    sink::{OutputBatch, ResultSink},
    stats::WorkerStats,
    Options,
};

pub(crate) struct WorkerContext {
    pub options: Arc<Options>,
    pub table: Arc<ChecksumTable>,
    pub jobs: JobReceiver,
    pub sink: Arc<dyn ResultSink>,
    /// Set by the first worker whose output write fails; every worker stops.
    pub halt: Arc<AtomicBool>,
}

/// Pull jobs until the queue is closed and drained, then flush and return
/// this worker's counters. Only files whose line reached the sink count.
pub(crate) fn run_worker(id: usize, ctx: WorkerContext) -> WorkerStats {
    let opt = &ctx.options;
    if let Some(cap) = opt.cpu_cap {
        pin_current_thread(id, cap);
    }
    // One read buffer per worker, reused for every file it hashes.
    let mut buf = vec![0u8; opt.buffer_size.max(1)];
    let mut batch = OutputBatch::new(opt.batch_lines);
    let mut stats = WorkerStats::default();
    let mut pending = WorkerStats::default();

    while let Some(job) = ctx.jobs.pop() {
        if ctx.halt.load(Ordering::Relaxed) {
            break;
        }
        match checksum_file(&ctx.table, &job, &mut buf) {
            Ok(sum) => {
                pending.record(job.size);
                if batch.push(sum, job.size, &job.path)
                    && !flush(&ctx, &mut batch, &mut pending, &mut stats)
                {
                    break;
                }
            }
            Err(e) => record_error(opt, e),
        }
    }
    if !ctx.halt.load(Ordering::Relaxed) {
        flush(&ctx, &mut batch, &mut pending, &mut stats);
    }
    // Dropping the receiver here lets the walker notice once every worker
    // has stopped.
    drop(ctx.jobs);

    log::debug!(
        "worker {id} finished: {} files, {} bytes",
        stats.files,
        stats.bytes
    );
    stats
}

/// Returns false once output is broken and the worker must stop.
#[inline]
fn flush(
    ctx: &WorkerContext,
    batch: &mut OutputBatch,
    pending: &mut WorkerStats,
    stats: &mut WorkerStats,
) -> bool {
    match batch.flush_to(ctx.sink.as_ref()) {
        Ok(_) => {
            stats.absorb(std::mem::take(pending));
            true
        }
        Err(source) => {
            *pending = WorkerStats::default();
            if !ctx.halt.swap(true, Ordering::Relaxed) {
                record_error(&ctx.options, ScanError::Output { source });
            }
            false
        }
    }
}
