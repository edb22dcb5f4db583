use parking_lot::Mutex;

use crate::buffer::ImageBuffer;
use crate::error::Result;

use super::{normalize_if_requested, PostStack, StackStrategy, WorkerSlots};

#[derive(Default)]
struct ExtremumSlot {
    extremum: Option<ImageBuffer>,
    count: usize,
}

/// Per-pixel maximum (or minimum) over the stack.
pub struct ExtremumStrategy {
    maximum: bool,
    post_stack: PostStack,
    slots: WorkerSlots<ExtremumSlot>,
    result: Mutex<Option<ImageBuffer>>,
    stacked: Mutex<usize>,
}

impl ExtremumStrategy {
    pub fn new(workers: usize, maximum: bool, post_stack: PostStack) -> Self {
        Self {
            maximum,
            post_stack,
            slots: WorkerSlots::new(workers),
            result: Mutex::new(None),
            stacked: Mutex::new(0),
        }
    }

    fn fold(&self, into: &mut Option<ImageBuffer>, image: ImageBuffer) -> Result<()> {
        match into.as_mut() {
            Some(acc) => {
                acc.check_compatible(&image)?;
                acc.keep_extremum(&image, self.maximum);
            }
            None => *into = Some(image),
        }
        Ok(())
    }
}

impl StackStrategy for ExtremumStrategy {
    fn process(&self, worker: usize, image: &ImageBuffer, _pass: u32) -> Result<()> {
        self.slots.with(worker, |slot| {
            self.fold(&mut slot.extremum, image.clone())?;
            slot.count += 1;
            Ok(())
        })
    }

    fn finish_all(&self) -> Result<()> {
        let mut total = None;
        let mut count = 0;
        for slot in self.slots.drain() {
            count += slot.count;
            if let Some(image) = slot.extremum {
                self.fold(&mut total, image)?;
            }
        }
        if let Some(buffer) = total.as_mut() {
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
