//! Cancellation and progress collaborators

use crate::{Result, ScanError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// Polled by the scanner to find out whether it should stop
pub trait Interrupter: Send + Sync {
    /// Fails with [`ScanError::Canceled`] once cancellation was requested
    fn check_interrupted(&self) -> Result<()>;
}

/// Never requests cancellation
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverInterrupt;

impl Interrupter for NeverInterrupt {
    fn check_interrupted(&self) -> Result<()> {
        Ok(())
    }
}

/// Shared cancellation flag; clones observe the same flag
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    canceled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

impl Interrupter for CancelFlag {
    fn check_interrupted(&self) -> Result<()> {
        if self.is_canceled() {
            Err(ScanError::Canceled)
        } else {
            Ok(())
        }
    }
}

/// Table-level progress notifications. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn set_total(&self, total: usize);

    fn advance(&self);
}

/// Discards progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_total(&self, _total: usize) {}

    fn advance(&self) {}
}

/// Logs progress through `tracing`
#[derive(Debug, Default)]
pub struct LogProgress {
    total: AtomicUsize,
    done: AtomicUsize,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }
}

impl ProgressSink for LogProgress {
    fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
    }

    fn advance(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        info!("Scanned {} of {} tables", done, self.total());
    }
}
