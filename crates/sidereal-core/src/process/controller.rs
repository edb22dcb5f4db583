use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::align::{AlignOutcome, Aligner, AlignmentParams};
use crate::buffer::{ImageBuffer, OperatorStrategy};
use crate::enumerate::ItemEnumerator;
use crate::error::{Result, SiderealError};
use crate::geometry::IntegerPoint;
use crate::item::ProcessableItem;
use crate::stack::{Stacker, StackingParams};
use crate::sync::CancelToken;

use super::{
    run_workers, ItemFailure, ItemProcessKind, NoopObserver, ParallelOptimization, ProcessKind,
    ProcessObserver, RunStatus, RunSummary,
};

/// Starts and stops processes on behalf of a document.
///
/// List processes block the calling thread until done; [`Self::stop_process`]
/// can be called from another thread to cancel the current one between items.
pub struct ProcessController {
    threads: usize,
    observer: Arc<dyn ProcessObserver>,
    current: Mutex<CancelToken>,
}

impl ProcessController {
    /// `threads == 0` uses one worker per core.
    pub fn new(threads: usize) -> Self {
        Self {
            threads,
            observer: Arc::new(NoopObserver),
            current: Mutex::new(CancelToken::new()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProcessObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Worker count for a process with the given capability.
    pub fn threads_for(&self, optimization: ParallelOptimization) -> usize {
        match optimization {
            ParallelOptimization::ListThreads if self.threads == 0 => {
                rayon::current_num_threads().max(1)
            }
            ParallelOptimization::ListThreads => self.threads,
            ParallelOptimization::None | ParallelOptimization::FftThreads => 1,
        }
    }

    /// Cancel the running process, if any.
    pub fn stop_process(&self) {
        self.current.lock().cancel();
    }

    /// Fire-and-forget notification that `item` went through a process.
    pub fn item_was_processed(&self, item: &dyn ProcessableItem) {
        self.observer.item_processed(item.name());
    }

    fn begin(&self) -> CancelToken {
        let token = CancelToken::new();
        *self.current.lock() = token.clone();
        token
    }

    /// Run a list process over `items`.
    ///
    /// Configuration errors are returned before any worker starts. Items
    /// that cannot be processed are listed in the summary.
    pub fn start_list_process(
        &self,
        kind: &ProcessKind,
        items: &ItemEnumerator,
    ) -> Result<RunSummary> {
        let cancel = self.begin();
        let threads = self.threads_for(kind.parallel_optimization());

        let summary = match kind {
            ProcessKind::Align(params) => self.align(params, items, threads, &cancel)?,
            ProcessKind::Stack(params) => self.stack(params, items, threads, &cancel)?,
        };

        info!(
            process = summary.process,
            status = ?summary.status,
            processed = summary.processed,
            failures = summary.failures.len(),
            "process ended"
        );
        self.observer.process_ended(&summary);
        Ok(summary)
    }

    fn align(
        &self,
        params: &AlignmentParams,
        items: &ItemEnumerator,
        threads: usize,
        cancel: &CancelToken,
    ) -> Result<RunSummary> {
        let aligner = Aligner::new(params.clone(), items.list())?;
        info!(
            reference = aligner.reference().name(),
            squares = params.squares.len(),
            threads,
            "alignment started"
        );
        self.observer
            .process_started("align", items.sweep_len(), 1);

        let processed = AtomicUsize::new(0);
        let failures: Mutex<Vec<(usize, ItemFailure)>> = Mutex::new(Vec::new());
        let record = |item: &dyn ProcessableItem, reason: String| {
            warn!(item = item.name(), %reason, "alignment failed");
            item.set_alignment(None);
            item.set_failure(Some(reason.clone()));
            self.observer.item_failed(item.name(), &reason);
            let position = items.list().position(item.name()).unwrap_or(usize::MAX);
            failures.lock().push((
                position,
                ItemFailure {
                    item: item.name().to_string(),
                    reason,
                },
            ));
        };

        let outcome = run_workers(threads, |worker, count| {
            for item in items.partition(worker, count) {
                cancel.check()?;
                let aligned = aligner.align(item.as_ref()).inspect_err(|e| {
                    if !matches!(e, SiderealError::Cancelled) {
                        cancel.cancel();
                    }
                })?;
                match aligned {
                    AlignOutcome::Aligned(result) => {
                        item.set_alignment(Some(result));
                        item.set_failure(None);
                        processed.fetch_add(1, Ordering::Relaxed);
                    }
                    AlignOutcome::Failed(reason) => record(item.as_ref(), reason),
                    AlignOutcome::Unreadable => {
                        record(item.as_ref(), "image cannot be read".to_string())
                    }
                }
                self.item_was_processed(item.as_ref());
            }
            Ok(())
        });

        let status = match outcome {
            Ok(()) => RunStatus::Completed,
            Err(SiderealError::Cancelled) => RunStatus::Cancelled,
            Err(e) => return Err(e),
        };
        let mut failures = failures.into_inner();
        failures.sort_by_key(|(position, _)| *position);
        Ok(RunSummary {
            process: "align",
            status,
            processed: processed.into_inner(),
            failures: failures.into_iter().map(|(_, f)| f).collect(),
            image: None,
        })
    }

    fn stack(
        &self,
        params: &StackingParams,
        items: &ItemEnumerator,
        threads: usize,
        cancel: &CancelToken,
    ) -> Result<RunSummary> {
        let stacker = Stacker::new(params.clone(), items.list())?;
        self.observer
            .process_started("stack", items.sweep_len(), params.mode.passes());

        let outcome = stacker.run(items, threads, &self.observer, cancel)?;
        let status = if outcome.cancelled {
            RunStatus::Cancelled
        } else {
            if outcome.image.is_none() {
                warn!("no image could be stacked");
            }
            RunStatus::Completed
        };
        Ok(RunSummary {
            process: "stack",
            status,
            processed: outcome.stacked,
            failures: outcome.failures,
            image: outcome.image,
        })
    }

    /// Apply `kind` to one item and store the result on it.
    pub fn start_item_process(
        &self,
        kind: &ItemProcessKind,
        item: &dyn ProcessableItem,
    ) -> Result<()> {
        self.begin();
        let image = item
            .image()
            .ok_or_else(|| SiderealError::UnreadableItem(item.name().to_string()))?;
        let mut result = (*image).clone();
        if kind.parallel_optimization() == ParallelOptimization::FftThreads
            && rayon::current_num_threads() > 1
        {
            result.set_strategy(OperatorStrategy::Parallelized);
        }

        match kind {
            ItemProcessKind::Calibrate { dark, flat, origin } => {
                for frame in [dark, flat].into_iter().flatten() {
                    check_calibration_frame(frame, &result, *origin)?;
                }
                result.calibrate(dark.as_ref(), flat.as_ref(), *origin);
            }
            ItemProcessKind::Normalize { factor, mono } => result.normalize(*factor, *mono),
        }

        info!(item = item.name(), process = kind.name(), "item processed");
        item.set_result(result);
        self.item_was_processed(item);
        Ok(())
    }
}

/// A calibration frame must cover the image at `origin`.
fn check_calibration_frame(
    frame: &ImageBuffer,
    image: &ImageBuffer,
    origin: IntegerPoint,
) -> Result<()> {
    let fits = origin.x >= 0
        && origin.y >= 0
        && origin.x as usize + image.width() <= frame.width()
        && origin.y as usize + image.height() <= frame.height();
    let planes_ok = frame.planes() == image.planes() || frame.planes() == 1;
    if fits && planes_ok {
        Ok(())
    } else {
        Err(SiderealError::IncompatibleBuffers(format!(
            "calibration frame {}x{}x{} cannot cover {}x{}x{} at ({}, {})",
            frame.width(),
            frame.height(),
            frame.planes(),
            image.width(),
            image.height(),
            image.planes(),
            origin.x,
            origin.y
        )))
    }
}
