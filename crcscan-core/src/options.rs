use std::sync::Arc;

use crate::{constants::pipeline::MAX_BUFFER_KB, EventReporter, Options, ScanEvent};

#[derive(Default, Clone)]
pub struct OptionsBuilder {
    pub workers: Option<usize>,
    pub queue_depth: Option<usize>,
    pub buffer_size: Option<usize>,
    pub cpu_cap: Option<usize>,
    pub batch_lines: Option<usize>,
    pub event_report: Option<EventReporter>,
}

impl OptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workers(mut self, v: usize) -> Self {
        self.workers = Some(v);
        self
    }
    pub fn queue_depth(mut self, v: usize) -> Self {
        self.queue_depth = Some(v);
        self
    }
    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = Some(bytes);
        self
    }
    pub fn buffer_size_kb(self, kb: usize) -> Self {
        self.buffer_size(kb.saturating_mul(1024))
    }
    pub fn cpu_cap(mut self, v: usize) -> Self {
        self.cpu_cap = Some(v);
        self
    }
    pub fn batch_lines(mut self, v: usize) -> Self {
        self.batch_lines = Some(v);
        self
    }
    pub fn on_event(mut self, f: impl Fn(&ScanEvent) + Send + Sync + 'static) -> Self {
        self.event_report = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Options {
        // Start from default to inherit env defaults
        let mut opt = Options::default();
        if let Some(v) = self.workers {
            opt.workers = v.max(1);
            // list-ahead follows the worker count unless set explicitly
            if self.queue_depth.is_none() && std::env::var("CRCSCAN_QUEUE_DEPTH").is_err() {
                opt.queue_depth = opt.workers;
            }
        }
        if let Some(v) = self.queue_depth {
            opt.queue_depth = v.max(1);
        }
        if let Some(v) = self.buffer_size {
            opt.buffer_size = v.clamp(1, MAX_BUFFER_KB * 1024);
        }
        if let Some(v) = self.cpu_cap {
            opt.cpu_cap = (v > 0).then_some(v);
        }
        if let Some(v) = self.batch_lines {
            opt.batch_lines = v.max(1);
        }
        if self.event_report.is_some() {
            opt.event_report = self.event_report;
        }
        opt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_values_win_and_are_clamped() {
        let opt = OptionsBuilder::new()
            .workers(3)
            .queue_depth(0)
            .buffer_size_kb(4)
            .batch_lines(0)
            .cpu_cap(0)
            .build();
        assert_eq!(opt.workers, 3);
        assert_eq!(opt.queue_depth, 1);
        assert_eq!(opt.buffer_size, 4096);
        assert_eq!(opt.batch_lines, 1);
        assert_eq!(opt.cpu_cap, None);

        let opt = OptionsBuilder::new().buffer_size(usize::MAX).build();
        assert_eq!(opt.buffer_size, MAX_BUFFER_KB * 1024);
    }

    #[test]
    fn queue_depth_follows_workers() {
        let opt = OptionsBuilder::new().workers(6).build();
        assert_eq!(opt.workers, 6);
        if std::env::var("CRCSCAN_QUEUE_DEPTH").is_err() {
            assert_eq!(opt.queue_depth, 6);
        }
        assert!(opt.event_report.is_none());
    }
}
