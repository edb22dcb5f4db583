//! Multi-threaded combination of registered images.
//!
//! Each worker thread folds images into its own slot of the strategy. The
//! slots are only combined in [`StackStrategy::finish_pass`] and
//! [`StackStrategy::finish_all`], which the [`Stacker`] calls once every
//! worker has reached the corresponding barrier. Slots are merged in worker
//! order, so the result does not depend on thread scheduling.

mod extremum;
mod params;
mod sigma_reject;
mod stacker;
mod standard;

use parking_lot::Mutex;

use crate::buffer::ImageBuffer;
use crate::error::Result;

pub use extremum::ExtremumStrategy;
pub use params::{PostStack, StackMode, StackingParams};
pub use sigma_reject::SigmaRejectStrategy;
pub use stacker::{StackOutcome, Stacker};
pub use standard::SumStrategy;

/// Accumulation strategy shared by every worker of a stacking run.
pub trait StackStrategy: Send + Sync {
    /// Sweeps over the list needed by the strategy.
    fn passes(&self) -> u32 {
        1
    }

    /// Fold one registered image into the slot of `worker`.
    fn process(&self, worker: usize, image: &ImageBuffer, pass: u32) -> Result<()>;

    /// Every worker has finished pass `pass`; run once, before anyone starts
    /// the next pass.
    fn finish_pass(&self, _pass: u32) -> Result<()> {
        Ok(())
    }

    /// Worker `worker` processed its last item.
    fn finish_thread(&self, _worker: usize) -> Result<()> {
        Ok(())
    }

    /// Every worker has finished; combine the slots into the result.
    fn finish_all(&self) -> Result<()>;

    /// The combined buffer, once [`Self::finish_all`] has run and at least
    /// one image was stacked.
    fn result(&self) -> Option<ImageBuffer>;

    /// Images folded in the last pass.
    fn images_stacked(&self) -> usize;
}

/// Strategy for `params.mode`, sized for `workers` threads.
pub fn build_strategy(params: &StackingParams, workers: usize) -> Box<dyn StackStrategy> {
    match params.mode {
        StackMode::Standard | StackMode::Calibration => {
            Box::new(SumStrategy::new(workers, params.post_stack))
        }
        StackMode::SigmaReject { threshold } => {
            Box::new(SigmaRejectStrategy::new(workers, threshold, params.post_stack))
        }
        StackMode::Extremum { maximum } => {
            Box::new(ExtremumStrategy::new(workers, maximum, params.post_stack))
        }
    }
}

/// One exclusively used accumulator per worker thread.
pub(crate) struct WorkerSlots<T> {
    slots: Vec<Mutex<T>>,
}

impl<T: Default> WorkerSlots<T> {
    pub(crate) fn new(workers: usize) -> Self {
        Self {
            slots: (0..workers.max(1)).map(|_| Mutex::new(T::default())).collect(),
        }
    }

    pub(crate) fn with<R>(&self, worker: usize, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.slots[worker].lock())
    }

    /// Take every slot's content, in worker order.
    pub(crate) fn drain(&self) -> Vec<T> {
        self.slots
            .iter()
            .map(|slot| std::mem::take(&mut *slot.lock()))
            .collect()
    }
}

/// Peak normalization shared by every strategy; `Mean` is handled by the
/// strategies that keep plain sums.
pub(crate) fn normalize_if_requested(buffer: &mut ImageBuffer, post_stack: PostStack) {
    if post_stack == PostStack::Normalize {
        buffer.normalize(0.0, true);
    }
}
