use super::RunSummary;

/// Thread-safe notifications from a running process.
///
/// Implementors can drive progress bars, logging, or any other UI feedback.
/// Calls come from worker threads and must not block for long. All methods
/// have default no-op implementations.
pub trait ProcessObserver: Send + Sync {
    /// A process started over `items` items (per pass).
    fn process_started(&self, _process: &str, _items: usize, _passes: u32) {}

    /// A new sweep over the list started.
    fn pass_started(&self, _pass: u32) {}

    /// One item went through the process.
    fn item_processed(&self, _item: &str) {}

    /// One item was skipped.
    fn item_failed(&self, _item: &str, _reason: &str) {}

    fn process_ended(&self, _summary: &RunSummary) {}
}

/// Observer that ignores every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl ProcessObserver for NoopObserver {}
