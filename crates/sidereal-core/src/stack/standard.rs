use parking_lot::Mutex;

use crate::buffer::ImageBuffer;
use crate::error::Result;

use super::{normalize_if_requested, PostStack, StackStrategy, WorkerSlots};

#[derive(Default)]
struct SumSlot {
    sum: Option<ImageBuffer>,
    count: usize,
}

/// Running sum, finalized by the post-stack action.
///
/// Used for both standard and calibration stacks; they differ only in how
/// the stacker registers the images.
pub struct SumStrategy {
    post_stack: PostStack,
    slots: WorkerSlots<SumSlot>,
    result: Mutex<Option<ImageBuffer>>,
    stacked: Mutex<usize>,
}

impl SumStrategy {
    pub fn new(workers: usize, post_stack: PostStack) -> Self {
        Self {
            post_stack,
            slots: WorkerSlots::new(workers),
            result: Mutex::new(None),
            stacked: Mutex::new(0),
        }
    }
}

impl StackStrategy for SumStrategy {
    fn process(&self, worker: usize, image: &ImageBuffer, _pass: u32) -> Result<()> {
        self.slots.with(worker, |slot| {
            match slot.sum.as_mut() {
                Some(sum) => {
                    sum.check_compatible(image)?;
                    sum.add(image);
                }
                None => slot.sum = Some(image.clone()),
            }
            slot.count += 1;
            Ok(())
        })
    }

    fn finish_all(&self) -> Result<()> {
        let mut total: Option<ImageBuffer> = None;
        let mut count = 0;
        for slot in self.slots.drain() {
            count += slot.count;
            let Some(sum) = slot.sum else {
                continue;
            };
            match total.as_mut() {
                Some(t) => {
                    t.check_compatible(&sum)?;
                    t.add(&sum);
                }
                None => total = Some(sum),
            }
        }

        if let Some(buffer) = total.as_mut() {
            if self.post_stack == PostStack::Mean {
                buffer.multiply_scalar(1.0 / count as f64);
            }
            normalize_if_requested(buffer, self.post_stack);
        }
        *self.stacked.lock() = count;
        *self.result.lock() = total;
        Ok(())
    }

    fn result(&self) -> Option<ImageBuffer> {
        self.result.lock().clone()
    }

    fn images_stacked(&self) -> usize {
        *self.stacked.lock()
    }
}
