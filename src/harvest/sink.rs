//! Progress and result observer interface.

use crate::models::Record;

/// Observer the orchestrator reports into.
///
/// Implementations own their locking; callbacks arrive from the crawl
/// task and, during the detail phase, from pool workers.
pub trait HarvestSink: Send + Sync {
    /// Progress update. In unbounded listing mode `total` is a rolling
    /// estimate; across the listing/detail phase boundary it is not
    /// monotonic.
    fn progress(&self, current: usize, total: usize, message: &str);

    /// A batch of newly collected records. Each record is delivered at
    /// most once per harvest.
    fn records(&self, batch: Vec<Record>);
}

/// Sink that discards everything. Used by one-shot CLI harvests.
pub struct NullSink;

impl HarvestSink for NullSink {
    fn progress(&self, _current: usize, _total: usize, _message: &str) {}

    fn records(&self, _batch: Vec<Record>) {}
}
