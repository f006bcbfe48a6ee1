use std::path::Path;

use crate::{
    error_handling::{record_error, ScanResult},
    scheduler::{Job, JobSender},
    walker, Options, ScanError, ScanEvent,
};

/// What a scanner can do while walking: enqueue files and report events.
pub struct WalkContext<'a> {
    pub(crate) options: &'a Options,
    pub(crate) queue: &'a JobSender,
}

impl<'a> WalkContext<'a> {
    /// Push a job, blocking while the queue is full. Returns false when no
    /// worker is left to receive it.
    #[inline]
    pub fn enqueue(&self, job: Job) -> bool {
        match self.queue.push(job) {
            Ok(()) => true,
            Err(closed) => {
                // every worker has stopped; the run reports why
                log::debug!(
                    "work queue closed; dropping {} and stopping walk",
                    closed.0.path.display()
                );
                false
            }
        }
    }

    #[inline]
    pub fn report(&self, ev: ScanEvent) {
        crate::common_ops::report_event(self.options, &ev);
    }

    #[inline]
    pub fn record_error(&self, err: ScanError) {
        record_error(self.options, err);
    }
}

/// Abstraction over filesystem enumeration to improve testability.
/// The default implementation walks the local filesystem.
pub trait FileSystemScanner: Send + Sync {
    /// Walk one root, enqueueing every regular file. An error means the
    /// root itself could not be walked and aborts the run.
    fn walk_root(&self, ctx: &WalkContext, root: &Path) -> ScanResult<()>;
}

/// Default scanner: recursive descent with `lstat` classification.
#[derive(Default, Clone, Copy)]
pub struct PlatformScanner;

impl FileSystemScanner for PlatformScanner {
    #[inline]
    fn walk_root(&self, ctx: &WalkContext, root: &Path) -> ScanResult<()> {
        walker::walk_root(ctx, root)
    }
}

#[inline]
pub fn platform_scanner() -> PlatformScanner {
    PlatformScanner
}
