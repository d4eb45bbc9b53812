//! Per-symbol progress callbacks for an ingestion run.

use tracing::{debug, info};

/// Observer for the symbol loop. Calls never influence the run.
pub trait IngestProgress: Send + Sync {
    /// Starting symbol `index` of `total`.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Symbol `index` normalized into `sessions` bars.
    fn on_complete(&self, symbol: &str, index: usize, total: usize, sessions: usize);

    fn on_batch_complete(&self, completed: usize, total: usize);
}

/// Reports through `tracing`.
pub struct LogProgress;

impl IngestProgress for LogProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        debug!(symbol, "[{}/{}] normalizing", index + 1, total);
    }

    fn on_complete(&self, symbol: &str, index: usize, total: usize, sessions: usize) {
        info!(symbol, sessions, "[{}/{}] written", index + 1, total);
    }

    fn on_batch_complete(&self, completed: usize, total: usize) {
        info!(completed, total, "all symbols written");
    }
}

pub struct NoProgress;

impl IngestProgress for NoProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {}

    fn on_complete(&self, _symbol: &str, _index: usize, _total: usize, _sessions: usize) {}

    fn on_batch_complete(&self, _completed: usize, _total: usize) {}
}
