//! Progress reporting for transfers (bytes done, total when known).
//!
//! Backends never print; they feed a [`ProgressObserver`] passed in by the
//! caller. [`ProgressTracker`] sits between the two and keeps reports
//! monotonic.

use std::cell::Cell;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_done: u64,
    /// Total size in bytes, once the transfer layer knows it.
    pub total_bytes: Option<u64>,
}

impl TransferProgress {
    /// Fraction complete in [0.0, 1.0], if the total is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.total_bytes {
            Some(0) => Some(1.0),
            Some(total) => Some((self.bytes_done as f64 / total as f64).min(1.0)),
            None => None,
        }
    }
}

/// Sink for user-facing progress. Not part of the correctness contract.
pub trait ProgressObserver: Send + Sync {
    fn on_start(&self, _name: &str, _total_bytes: Option<u64>) {}

    fn on_progress(&self, progress: TransferProgress);

    fn on_finish(&self, _bytes: u64) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _progress: TransferProgress) {}
}

/// Emits a `debug` event each time another `step_bytes` have arrived.
#[derive(Debug)]
pub struct LogProgress {
    step_bytes: u64,
    next_report: AtomicU64,
}

impl LogProgress {
    pub fn new(step_bytes: u64) -> Self {
        Self {
            step_bytes: step_bytes.max(1),
            next_report: AtomicU64::new(0),
        }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(8 * 1024 * 1024)
    }
}

impl ProgressObserver for LogProgress {
    fn on_start(&self, name: &str, total_bytes: Option<u64>) {
        self.next_report.store(self.step_bytes, Ordering::Relaxed);
        tracing::debug!(name, total_bytes, "transfer started");
    }

    fn on_progress(&self, progress: TransferProgress) {
        let next = self.next_report.load(Ordering::Relaxed);
        if progress.bytes_done >= next {
            self.next_report
                .store(progress.bytes_done + self.step_bytes, Ordering::Relaxed);
            tracing::debug!(
                bytes_done = progress.bytes_done,
                total_bytes = progress.total_bytes,
                "transfer progress"
            );
        }
    }

    fn on_finish(&self, bytes: u64) {
        tracing::debug!(bytes, "transfer finished");
    }
}

/// Per-transfer state in front of an observer. Drops reports that would move
/// backwards or repeat, so observers only ever see increasing byte counts.
pub struct ProgressTracker<'a> {
    observer: &'a dyn ProgressObserver,
    bytes_done: Cell<u64>,
    total_bytes: Cell<Option<u64>>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(observer: &'a dyn ProgressObserver) -> Self {
        Self {
            observer,
            bytes_done: Cell::new(0),
            total_bytes: Cell::new(None),
        }
    }

    pub fn start(&self, name: &str, total_bytes: Option<u64>) {
        self.total_bytes.set(total_bytes);
        self.observer.on_start(name, total_bytes);
    }

    /// Record a total learned mid-transfer. A zero total means "unknown".
    pub fn set_total(&self, total_bytes: u64) {
        if total_bytes == 0 || self.total_bytes.get() == Some(total_bytes) {
            return;
        }
        self.total_bytes.set(Some(total_bytes));
        self.report();
    }

    pub fn advance(&self, n: u64) {
        if n == 0 {
            return;
        }
        self.bytes_done.set(self.bytes_done.get() + n);
        self.report();
    }

    pub fn bytes_done(&self) -> u64 {
        self.bytes_done.get()
    }

    pub fn finish(&self) {
        self.observer.on_finish(self.bytes_done.get());
    }

    fn report(&self) {
        self.observer.on_progress(TransferProgress {
            bytes_done: self.bytes_done.get(),
            total_bytes: self.total_bytes.get(),
        });
    }
}

/// Writer that counts bytes into a tracker and remembers the first local
/// write failure, so callers can tell a full disk apart from a dropped
/// connection after the transfer layer aborts.
pub struct ProgressWriter<'t, 'a, W> {
    inner: W,
    tracker: &'t ProgressTracker<'a>,
    error: Option<io::Error>,
}

impl<'t, 'a, W: Write> ProgressWriter<'t, 'a, W> {
    pub fn new(inner: W, tracker: &'t ProgressTracker<'a>) -> Self {
        Self {
            inner,
            tracker,
            error: None,
        }
    }

    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write> Write for ProgressWriter<'_, '_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner.write(buf) {
            Ok(n) => {
                self.tracker.advance(n as u64);
                Ok(n)
            }
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(io::Error::new(e.kind(), e.to_string()));
                }
                Err(e)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
