//! Result output: per-worker line batches and the shared stream they flush to.

use std::{
    io::{self, Write},
    path::Path,
    sync::Mutex,
};

use crate::{checksum::Checksum, common_ops::append_result_line, constants::pipeline::LINE_SIZE_HINT};

/// Shared destination for result lines.
///
/// Each `write_batch` call must land as one uninterrupted write so that
/// lines from different workers never interleave mid-line.
pub trait ResultSink: Send + Sync {
    fn write_batch(&self, batch: &[u8]) -> io::Result<()>;
}

/// Process stdout, locked for the duration of each batch.
#[derive(Default, Clone, Copy)]
pub struct StdoutSink;

impl ResultSink for StdoutSink {
    fn write_batch(&self, batch: &[u8]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(batch)?;
        out.flush()
    }
}

/// Any writer behind a mutex; handy for files and in-memory capture.
pub struct WriterSink<W> {
    inner: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner.into_inner().unwrap_or_else(|p| p.into_inner())
    }
}

impl WriterSink<Vec<u8>> {
    /// Copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        match self.inner.lock() {
            Ok(g) => g.clone(),
            Err(p) => p.into_inner().clone(),
        }
    }
}

impl<W: Write + Send> ResultSink for WriterSink<W> {
    fn write_batch(&self, batch: &[u8]) -> io::Result<()> {
        let mut w = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("result sink lock poisoned"))?;
        w.write_all(batch)?;
        w.flush()
    }
}

/// Pending result lines owned by one worker.
pub struct OutputBatch {
    buf: Vec<u8>,
    lines: usize,
    limit: usize,
}

impl OutputBatch {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            buf: Vec::with_capacity(limit * LINE_SIZE_HINT),
            lines: 0,
            limit,
        }
    }

    /// Append one result line; true when the batch is due for a flush.
    pub fn push(&mut self, checksum: Checksum, size: u64, path: &Path) -> bool {
        append_result_line(&mut self.buf, checksum, size, path);
        self.lines += 1;
        self.lines >= self.limit
    }

    pub fn len(&self) -> usize {
        self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines == 0
    }

    /// Write pending lines as a single batch. The batch is emptied even on
    /// error so a broken sink cannot grow it without bound.
    pub fn flush_to(&mut self, sink: &dyn ResultSink) -> io::Result<usize> {
        if self.lines == 0 {
            return Ok(0);
        }
        let n = self.lines;
        let res = sink.write_batch(&self.buf);
        self.buf.clear();
        self.lines = 0;
        res.map(|()| n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        inner: WriterSink<Vec<u8>>,
        calls: AtomicUsize,
    }

    impl ResultSink for CountingSink {
        fn write_batch(&self, batch: &[u8]) -> io::Result<()> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.inner.write_batch(batch)
        }
    }

    #[test]
    fn flushes_at_limit_and_on_finish() {
        let sink = CountingSink {
            inner: WriterSink::new(Vec::new()),
            calls: AtomicUsize::new(0),
        };
        let mut batch = OutputBatch::new(256);
        let mut flushed = 0;
        for i in 0..600u64 {
            let p = format!("f{i}");
            if batch.push(Checksum(i as u32), i, Path::new(&p)) {
                flushed += batch.flush_to(&sink).unwrap();
            }
        }
        assert_eq!(flushed, 512);
        assert_eq!(batch.len(), 88);
        flushed += batch.flush_to(&sink).unwrap();
        assert_eq!(flushed, 600);
        assert_eq!(sink.calls.load(Ordering::Relaxed), 3);
        assert_eq!(batch.flush_to(&sink).unwrap(), 0, "empty batch is not written");

        let text = String::from_utf8(sink.inner.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 600);
        assert!(lines[599].ends_with(" 0000000000000257 f599"));
    }

    struct BrokenSink;

    impl ResultSink for BrokenSink {
        fn write_batch(&self, _batch: &[u8]) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn failed_flush_still_empties_batch() {
        let mut batch = OutputBatch::new(4);
        batch.push(Checksum(1), 1, Path::new("x"));
        assert!(batch.flush_to(&BrokenSink).is_err());
        assert!(batch.is_empty());
    }
}
