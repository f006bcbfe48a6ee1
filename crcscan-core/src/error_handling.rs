use std::{fmt, path::PathBuf, sync::atomic::Ordering};

use crate::{Options, ScanEvent};

/// Recommended next step when an error occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    SkipEntry,
    DropItem,
    Abort,
}

/// Which kind of walked entry an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

impl EntryKind {
    pub fn label(self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Dir => "dir",
        }
    }
}

/// Typed pipeline errors; used for diagnostics and recovery hints.
#[derive(Debug)]
pub enum ScanError {
    /// stat/readdir failed on a walked entry
    Metadata {
        path: PathBuf,
        kind: EntryKind,
        source: std::io::Error,
    },
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    /// read failed mid-stream
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// the file changed size between listing and reading
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
    /// a batch of result lines could not be written
    Output { source: std::io::Error },
    SelfTest {
        expected: &'static str,
        calculated: String,
    },
    WalkInit {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Metadata { path, source, .. } => {
                write!(f, "{}: {}", path.display(), source)
            }
            ScanError::Open { path, source } => {
                write!(f, "{}: open failed: {}", path.display(), source)
            }
            ScanError::Io { path, source } => {
                write!(f, "{}: read failed: {}", path.display(), source)
            }
            ScanError::SizeMismatch {
                path,
                expected,
                actual,
            } => write!(
                f,
                "{}: size changed while reading (listed {} bytes, read {})",
                path.display(),
                expected,
                actual
            ),
            ScanError::Output { source } => write!(f, "writing results failed: {source}"),
            ScanError::SelfTest {
                expected,
                calculated,
            } => write!(
                f,
                "checksum self-test failed [expected: {expected}, calculated: {calculated}]"
            ),
            ScanError::WalkInit { path, source } => {
                write!(f, "cannot walk {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::Metadata { source, .. }
            | ScanError::Open { source, .. }
            | ScanError::Io { source, .. }
            | ScanError::Output { source }
            | ScanError::WalkInit { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;

pub trait ErrorRecovery {
    fn is_recoverable(&self) -> bool;
    fn recovery_action(&self) -> RecoveryAction;
}

impl ErrorRecovery for ScanError {
    fn is_recoverable(&self) -> bool {
        !matches!(self.recovery_action(), RecoveryAction::Abort)
    }
    fn recovery_action(&self) -> RecoveryAction {
        match self {
            ScanError::Metadata { .. } => RecoveryAction::SkipEntry,
            ScanError::Open { .. } | ScanError::Io { .. } | ScanError::SizeMismatch { .. } => {
                RecoveryAction::DropItem
            }
            // a broken result stream ends the run
            ScanError::Output { .. } | ScanError::SelfTest { .. } | ScanError::WalkInit { .. } => {
                RecoveryAction::Abort
            }
        }
    }
}

/// Count an error and hand it to the diagnostic stream.
#[inline]
pub fn record_error(opt: &Options, err: ScanError) {
    opt.error_count.fetch_add(1, Ordering::Relaxed);
    crate::common_ops::report_event(opt, &ScanEvent::Error(err));
}
