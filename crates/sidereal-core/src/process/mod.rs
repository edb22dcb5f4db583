//! Document-level process control: list processes run on a worker pool,
//! item processes run on a single item.

mod controller;
mod observer;
mod workers;

use serde::{Deserialize, Serialize};

use crate::align::AlignmentParams;
use crate::buffer::ImageBuffer;
use crate::geometry::IntegerPoint;
use crate::stack::StackingParams;

pub use controller::ProcessController;
pub use observer::{NoopObserver, ProcessObserver};
pub(crate) use workers::run_workers;

/// Threading capability a process declares to the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParallelOptimization {
    /// One thread, sequential buffer operators.
    None,
    /// One thread; buffer operators and FFTs may use the Rayon pool.
    FftThreads,
    /// One worker per thread over the list; operators stay sequential
    /// inside each worker.
    ListThreads,
}

/// A process over a whole list.
#[derive(Clone, Debug)]
pub enum ProcessKind {
    Align(AlignmentParams),
    Stack(StackingParams),
}

impl ProcessKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProcessKind::Align(_) => "align",
            ProcessKind::Stack(_) => "stack",
        }
    }

    pub fn parallel_optimization(&self) -> ParallelOptimization {
        ParallelOptimization::ListThreads
    }
}

/// A process applied to one item, whose result replaces the item's image.
#[derive(Clone, Debug)]
pub enum ItemProcessKind {
    /// Subtract `dark` and divide by `flat`; `origin` is the item's position
    /// in the full-sensor calibration frames.
    Calibrate {
        dark: Option<ImageBuffer>,
        flat: Option<ImageBuffer>,
        origin: IntegerPoint,
    },
    /// See [`ImageBuffer::normalize`].
    Normalize { factor: f64, mono: bool },
}

impl ItemProcessKind {
    pub fn name(&self) -> &'static str {
        match self {
            ItemProcessKind::Calibrate { .. } => "calibrate",
            ItemProcessKind::Normalize { .. } => "normalize",
        }
    }

    pub fn parallel_optimization(&self) -> ParallelOptimization {
        ParallelOptimization::FftThreads
    }
}

/// An item the run had to skip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item: String,
    pub reason: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Completed,
    Cancelled,
}

/// What a list process did. Fatal errors are returned as `Err` instead.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub process: &'static str,
    pub status: RunStatus,
    /// Items aligned, or images stacked.
    pub processed: usize,
    pub failures: Vec<ItemFailure>,
    /// Stacked image, for stacking runs that stacked something.
    pub image: Option<ImageBuffer>,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
