//! Progress reporting and cancellation for integration runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use common::SharedFn;

/// Progress information for an integration run.
#[derive(Debug, Clone)]
pub struct IntegrationProgress {
    /// Current input file (0-based), or the file count when finalizing.
    pub current: usize,
    /// Total number of input files.
    pub total: usize,
    pub stage: IntegrationStage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationStage {
    /// Reading drizzle data, normalization data and source pixels.
    Loading,
    /// Accumulating drops into the output canvas.
    Integrating,
    /// Dividing by the weights and fixing the output range.
    Finalizing,
}

/// Callback type for progress reporting.
pub type ProgressCallback = SharedFn<dyn Fn(IntegrationProgress) + Send + Sync>;

/// Report progress using the callback if set.
pub fn report_progress(
    callback: &ProgressCallback,
    current: usize,
    total: usize,
    stage: IntegrationStage,
) {
    if let Some(f) = callback.as_ref() {
        f(IntegrationProgress {
            current,
            total,
            stage,
        });
    }
}

/// Shared cancellation request, polled between files and once per output row.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
