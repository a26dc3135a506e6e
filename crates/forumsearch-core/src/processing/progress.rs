//! Progress reporting for index rebuilds.

use std::time::Instant;

/// Embedding progress within one rebuild.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingProgress {
    /// Batches sent so far
    pub batches_completed: usize,
    /// Batches needed for this rebuild
    pub batches_total: usize,
    /// Chunks embedded so far
    pub chunks_embedded: usize,
    /// Time since the rebuild started (milliseconds)
    pub elapsed_ms: u64,
}

impl EmbeddingProgress {
    /// Returns the completion percentage (0.0 to 100.0).
    pub fn percent_complete(&self) -> f64 {
        if self.batches_total == 0 {
            100.0
        } else {
            (self.batches_completed as f64 / self.batches_total as f64) * 100.0
        }
    }

    /// Returns true once every batch is embedded.
    pub fn is_complete(&self) -> bool {
        self.batches_completed >= self.batches_total
    }
}

/// Elapsed-time helper.
pub(crate) struct ProgressTimer {
    start: Instant,
}

impl ProgressTimer {
    pub(crate) fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub(crate) fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
