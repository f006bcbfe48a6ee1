//! Work items and the bounded queue between the walker and the workers.
//!
//! The queue never holds more than its capacity; `push` blocks the walker
//! while it is full, which is what keeps memory flat on huge trees.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// One regular file to checksum, with the size seen when it was listed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    pub path: PathBuf,
    pub size: u64,
}

impl Job {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

#[derive(Debug, Default)]
pub struct QueueStats {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    /// pushes that found the queue full and had to wait
    backpressure_events: AtomicU64,
}

impl QueueStats {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn dequeued(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    pub fn backpressure_count(&self) -> u64 {
        self.backpressure_events.load(Ordering::Relaxed)
    }
}

/// Returned by `push` once every receiver is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueClosed(pub Job);

/// Creates a bounded FIFO of `capacity` jobs (at least 1).
pub fn work_queue(capacity: usize) -> (JobSender, JobReceiver) {
    let (sender, receiver) = bounded(capacity.max(1));
    let stats = Arc::new(QueueStats::default());
    (
        JobSender {
            sender,
            stats: Arc::clone(&stats),
        },
        JobReceiver { receiver, stats },
    )
}

/// Producer half, owned by the walker.
///
/// Not `Clone`: there is exactly one producer, so `close` is the single
/// end-of-work signal.
pub struct JobSender {
    sender: Sender<Job>,
    stats: Arc<QueueStats>,
}

impl JobSender {
    /// Enqueue a job, blocking while the queue is full.
    pub fn push(&self, job: Job) -> Result<(), QueueClosed> {
        let job = match self.sender.try_send(job) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
            Err(TrySendError::Full(job)) => {
                self.stats.backpressure_events.fetch_add(1, Ordering::Relaxed);
                job
            }
            Err(TrySendError::Disconnected(job)) => return Err(QueueClosed(job)),
        };
        self.sender.send(job).map_err(|e| QueueClosed(e.into_inner()))?;
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// No more jobs will follow; receivers drain what is left and stop.
    pub fn close(self) {
        drop(self);
    }

    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.sender.capacity().unwrap_or(0)
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

/// Consumer half; cloned once per worker.
#[derive(Clone)]
pub struct JobReceiver {
    receiver: Receiver<Job>,
    stats: Arc<QueueStats>,
}

impl JobReceiver {
    /// Next job in FIFO order. Blocks while the queue is empty and still
    /// open; `None` once it is closed and drained.
    pub fn pop(&self) -> Option<Job> {
        let job = self.receiver.recv().ok()?;
        self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        Some(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::AtomicBool,
        thread,
        time::Duration,
    };

    #[test]
    fn fifo_then_drain_after_close() {
        let (tx, rx) = work_queue(4);
        tx.push(Job::new("a", 1)).unwrap();
        tx.push(Job::new("b", 2)).unwrap();
        tx.push(Job::new("c", 3)).unwrap();
        tx.close();
        let order: Vec<_> = std::iter::from_fn(|| rx.pop()).map(|j| j.path).collect();
        assert_eq!(order, vec![PathBuf::from("a"), "b".into(), "c".into()]);
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let (tx, _rx) = work_queue(0);
        assert_eq!(tx.capacity(), 1);
    }

    #[test]
    fn push_blocks_while_full() {
        let (tx, rx) = work_queue(1);
        let stats = tx.stats();
        tx.push(Job::new("first", 0)).unwrap();
        assert_eq!(tx.len(), 1);

        let pushed = Arc::new(AtomicBool::new(false));
        let pushed_c = Arc::clone(&pushed);
        let producer = thread::spawn(move || {
            tx.push(Job::new("second", 0)).unwrap();
            pushed_c.store(true, Ordering::SeqCst);
            tx.close();
        });

        thread::sleep(Duration::from_millis(100));
        assert!(!pushed.load(Ordering::SeqCst), "push must wait for room");

        assert_eq!(rx.pop().unwrap().path, PathBuf::from("first"));
        producer.join().unwrap();
        assert!(pushed.load(Ordering::SeqCst));
        assert_eq!(rx.pop().unwrap().path, PathBuf::from("second"));
        assert_eq!(rx.pop(), None);
        assert_eq!(stats.backpressure_count(), 1);
        assert_eq!(stats.enqueued(), 2);
        assert_eq!(stats.dequeued(), 2);
    }

    #[test]
    fn push_after_receivers_gone() {
        let (tx, rx) = work_queue(2);
        drop(rx);
        let err = tx.push(Job::new("x", 9)).unwrap_err();
        assert_eq!(err.0, Job::new("x", 9));
    }
}
