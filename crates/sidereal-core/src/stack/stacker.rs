use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::buffer::{ImageBuffer, OperatorStrategy};
use crate::enumerate::{FixedPasses, ItemEnumerator, MultiPassEnumerator, PassDelegate, Step};
use crate::error::{Result, SiderealError};
use crate::geometry::AffineTransform;
use crate::interpolate::resolve_interpolator;
use crate::item::{ImageList, ProcessableItem};
use crate::process::{run_workers, ItemFailure, ProcessObserver};
use crate::sync::{CancelToken, PassBarrier};

use super::{build_strategy, StackStrategy, StackingParams};

/// Result of a stacking run.
#[derive(Clone, Debug)]
pub struct StackOutcome {
    /// `None` when no image could be stacked or the run was cancelled.
    pub image: Option<ImageBuffer>,
    /// Images in the result; for a cancelled run, images registered before
    /// it stopped.
    pub stacked: usize,
    pub passes: u32,
    /// Skipped items, in list order.
    pub failures: Vec<ItemFailure>,
    pub cancelled: bool,
}

enum Registration {
    Ready(ImageBuffer),
    Skipped(String),
}

/// Runs a stacking strategy over an item list with a pool of workers.
pub struct Stacker {
    params: StackingParams,
    planes: usize,
}

impl Stacker {
    /// Validate `params` against `list`.
    ///
    /// Fails on an empty list, an empty crop rectangle, or a kernel that is
    /// incompatible with the extra transform.
    pub fn new(params: StackingParams, list: &ImageList) -> Result<Self> {
        if list.is_empty() {
            return Err(SiderealError::EmptySequence);
        }
        if params.crop.is_empty() {
            return Err(SiderealError::Config("empty crop rectangle".into()));
        }
        resolve_interpolator(params.interpolator.as_deref(), &params.transform)?;
        let planes = if params.monochrome {
            1
        } else {
            list.max_planes()
        };
        Ok(Self { params, planes })
    }

    pub fn params(&self) -> &StackingParams {
        &self.params
    }

    /// Planes of the stacked image.
    pub fn planes(&self) -> usize {
        self.planes
    }

    /// Resample an item into the destination frame.
    fn register(
        &self,
        item: &dyn ProcessableItem,
        strategy: OperatorStrategy,
    ) -> Result<Registration> {
        let Some(image) = item.image() else {
            return Ok(Registration::Skipped("image cannot be read".into()));
        };
        let alignment = if self.params.mode.uses_alignment() {
            match item.alignment() {
                Some(result) => result.transform,
                None => return Ok(Registration::Skipped("item is not aligned".into())),
            }
        } else {
            AffineTransform::identity()
        };

        let transform = self.params.transform.then(&alignment);
        let kind = match resolve_interpolator(self.params.interpolator.as_deref(), &transform) {
            Ok(kind) => kind,
            Err(e) => return Ok(Registration::Skipped(e.to_string())),
        };
        let interpolator = kind.build(
            &image,
            self.params.crop,
            self.planes,
            &transform,
            None,
            &self.params.interpolator_params,
        );
        let mut registered = interpolator.resample()?;
        registered.set_strategy(strategy);
        Ok(Registration::Ready(registered))
    }

    /// Stack the items of `items` with `threads` workers.
    ///
    /// Each worker enumerates its own partition of `items`. Recombination
    /// happens once, in the last worker to leave. A cancelled run still
    /// returns the failures and count gathered so far.
    pub fn run(
        &self,
        items: &ItemEnumerator,
        threads: usize,
        observer: &Arc<dyn ProcessObserver>,
        cancel: &CancelToken,
    ) -> Result<StackOutcome> {
        let threads = threads.max(1);
        let strategy = build_strategy(&self.params, threads);
        let passes = strategy.passes();
        let delegate: Arc<dyn PassDelegate> = Arc::new(FixedPasses(passes));
        let barrier = PassBarrier::new(threads);
        let failures: Mutex<Vec<(usize, ItemFailure)>> = Mutex::new(Vec::new());
        let registered = AtomicUsize::new(0);
        let buffer_strategy = if threads == 1 {
            OperatorStrategy::Parallelized
        } else {
            OperatorStrategy::Standard
        };

        info!(
            mode = %self.params.mode,
            threads,
            passes,
            planes = self.planes,
            width = self.params.crop.width(),
            height = self.params.crop.height(),
            "stacking started"
        );

        let outcome = run_workers(threads, |worker, count| {
            let mut steps =
                MultiPassEnumerator::new(items.partition(worker, count), Arc::clone(&delegate));
            if worker == 0 {
                let observer = Arc::clone(observer);
                steps = steps.with_pass_listener(Arc::new(move |pass| observer.pass_started(pass)));
            }

            let outcome = self
                .work(
                    worker,
                    &mut steps,
                    strategy.as_ref(),
                    &barrier,
                    buffer_strategy,
                    observer,
                    cancel,
                    &failures,
                    &registered,
                    items.list(),
                )
                .and_then(|()| strategy.finish_thread(worker));
            if let Err(e) = &outcome {
                if !matches!(e, SiderealError::Cancelled) {
                    cancel.cancel();
                }
            }

            let last = barrier.leave(outcome.is_ok());
            outcome?;
            if last && !barrier.is_broken() {
                strategy.finish_all()?;
            }
            Ok(())
        });
        let cancelled = match outcome {
            Ok(()) => false,
            Err(SiderealError::Cancelled) => true,
            Err(e) => return Err(e),
        };

        let mut failures = failures.into_inner();
        failures.sort_by_key(|(position, _)| *position);
        let failures = failures.into_iter().map(|(_, f)| f).collect();
        let outcome = if cancelled {
            StackOutcome {
                image: None,
                stacked: registered.into_inner(),
                passes,
                failures,
                cancelled,
            }
        } else {
            StackOutcome {
                image: strategy.result(),
                stacked: strategy.images_stacked(),
                passes,
                failures,
                cancelled,
            }
        };
        if cancelled {
            warn!(
                registered = outcome.stacked,
                skipped = outcome.failures.len(),
                "stacking cancelled"
            );
        } else {
            info!(
                stacked = outcome.stacked,
                skipped = outcome.failures.len(),
                "stacking finished"
            );
        }
        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    fn work(
        &self,
        worker: usize,
        steps: &mut MultiPassEnumerator,
        strategy: &dyn StackStrategy,
        barrier: &PassBarrier,
        buffer_strategy: OperatorStrategy,
        observer: &Arc<dyn ProcessObserver>,
        cancel: &CancelToken,
        failures: &Mutex<Vec<(usize, ItemFailure)>>,
        registered: &AtomicUsize,
        list: &ImageList,
    ) -> Result<()> {
        loop {
            match steps.next_step() {
                Step::Item(item) => {
                    cancel.check()?;
                    let pass = steps.pass();
                    match self.register(item.as_ref(), buffer_strategy)? {
                        Registration::Ready(image) => {
                            strategy.process(worker, &image, pass)?;
                            if pass == 1 {
                                registered.fetch_add(1, Ordering::Relaxed);
                            }
                            debug!(worker, pass, item = item.name(), "stacked");
                        }
                        // Skips are the same in every pass; report them once.
                        Registration::Skipped(reason) if pass == 1 => {
                            item.set_failure(Some(reason.clone()));
                            observer.item_failed(item.name(), &reason);
                            let position = list.position(item.name()).unwrap_or(usize::MAX);
                            failures.lock().push((
                                position,
                                ItemFailure {
                                    item: item.name().to_string(),
                                    reason,
                                },
                            ));
                        }
                        Registration::Skipped(_) => {}
                    }
                    observer.item_processed(item.name());
                }
                Step::EndOfPass(pass) => {
                    barrier.wait_with(|| strategy.finish_pass(pass))?;
                }
                Step::EndOfSequence => return Ok(()),
            }
        }
    }
}
