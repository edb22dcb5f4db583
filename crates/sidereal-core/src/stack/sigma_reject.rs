use std::sync::OnceLock;

use ndarray::{Array3, Zip};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::buffer::ImageBuffer;
use crate::consts::{EPSILON, SIGMA_REJECT_PASSES};
use crate::error::{Result, SiderealError};

use super::{normalize_if_requested, PostStack, StackStrategy, WorkerSlots};

#[derive(Default)]
struct SigmaSlot {
    sum: Option<Array3<f64>>,
    sum_sq: Option<Array3<f64>>,
    count: usize,
    kept: Option<Array3<f64>>,
    hits: Option<Array3<u32>>,
}

/// Per-pixel mean and standard deviation from the first pass.
struct PassStatistics {
    mean: Array3<f64>,
    sigma: Array3<f64>,
    count: usize,
}

fn zeros_like<T: Clone + num_traits::Zero>(image: &ImageBuffer) -> Array3<T> {
    Array3::zeros((image.planes(), image.height(), image.width()))
}

/// Visit every sample of `image` with its `(plane, y, x)` index.
fn for_each_sample(image: &ImageBuffer, mut f: impl FnMut((usize, usize, usize), f64)) {
    for p in 0..image.planes() {
        for ((y, x), &v) in image.plane(p).indexed_iter() {
            f((p, y, x), v as f64);
        }
    }
}

fn add_into<T: Copy + std::ops::AddAssign>(total: &mut Option<Array3<T>>, part: Option<Array3<T>>) {
    let Some(part) = part else {
        return;
    };
    match total.as_mut() {
        Some(t) => Zip::from(t).and(&part).for_each(|a, &b| *a += b),
        None => *total = Some(part),
    }
}

/// Two-pass sigma-clipped mean.
///
/// Pass 1 accumulates sums and sums of squares. Between the passes the
/// per-pixel mean and standard deviation are derived once. Pass 2 keeps
/// only the samples within `threshold` standard deviations and divides
/// each pixel by its own inclusion count. A pixel whose samples were all
/// rejected keeps the pass-1 mean.
pub struct SigmaRejectStrategy {
    threshold: f64,
    post_stack: PostStack,
    slots: WorkerSlots<SigmaSlot>,
    statistics: OnceLock<PassStatistics>,
    result: Mutex<Option<ImageBuffer>>,
}

impl SigmaRejectStrategy {
    pub fn new(workers: usize, threshold: f32, post_stack: PostStack) -> Self {
        Self {
            threshold: threshold.max(0.0) as f64,
            post_stack,
            slots: WorkerSlots::new(workers),
            statistics: OnceLock::new(),
            result: Mutex::new(None),
        }
    }

    fn accumulate(&self, slot: &mut SigmaSlot, image: &ImageBuffer) {
        let sum = slot.sum.get_or_insert_with(|| zeros_like(image));
        let sum_sq = slot.sum_sq.get_or_insert_with(|| zeros_like(image));
        for_each_sample(image, |idx, v| {
            sum[idx] += v;
            sum_sq[idx] += v * v;
        });
        slot.count += 1;
    }

    fn accumulate_kept(&self, slot: &mut SigmaSlot, image: &ImageBuffer, stats: &PassStatistics) {
        let kept = slot.kept.get_or_insert_with(|| zeros_like(image));
        let hits = slot.hits.get_or_insert_with(|| zeros_like(image));
        let k = self.threshold;
        for_each_sample(image, |idx, v| {
            let sigma = stats.sigma[idx];
            // No spread: nothing to reject.
            if sigma < EPSILON as f64 || (v - stats.mean[idx]).abs() <= k * sigma {
                kept[idx] += v;
                hits[idx] += 1;
            }
        });
    }
}

impl StackStrategy for SigmaRejectStrategy {
    fn passes(&self) -> u32 {
        SIGMA_REJECT_PASSES
    }

    fn process(&self, worker: usize, image: &ImageBuffer, pass: u32) -> Result<()> {
        if pass <= 1 {
            self.slots.with(worker, |slot| {
                if let Some(sum) = &slot.sum {
                    if sum.dim() != (image.planes(), image.height(), image.width()) {
                        return Err(SiderealError::IncompatibleBuffers(format!(
                            "{:?} vs {}x{}x{}",
                            sum.dim(),
                            image.planes(),
                            image.height(),
                            image.width()
                        )));
                    }
                }
                self.accumulate(slot, image);
                Ok(())
            })
        } else {
            let stats = self.statistics.get().ok_or_else(|| {
                SiderealError::Config("sigma-reject statistics are not available".into())
            })?;
            if stats.mean.dim() != (image.planes(), image.height(), image.width()) {
                return Err(SiderealError::IncompatibleBuffers(format!(
                    "{:?} vs {}x{}x{}",
                    stats.mean.dim(),
                    image.planes(),
                    image.height(),
                    image.width()
                )));
            }
            self.slots
                .with(worker, |slot| self.accumulate_kept(slot, image, stats));
            Ok(())
        }
    }

    fn finish_pass(&self, pass: u32) -> Result<()> {
        if pass != 1 {
            return Ok(());
        }
        let mut sum = None;
        let mut sum_sq = None;
        let mut count = 0;
        for slot in self.slots.drain() {
            add_into(&mut sum, slot.sum);
            add_into(&mut sum_sq, slot.sum_sq);
            count += slot.count;
        }

        let (Some(sum), Some(sum_sq)) = (sum, sum_sq) else {
            return Ok(());
        };
        let n = count as f64;
        let mean = sum.mapv(|s| s / n);
        let mut sigma = Array3::<f64>::zeros(mean.raw_dim());
        Zip::from(&mut sigma)
            .and(&sum_sq)
            .and(&mean)
            .for_each(|s, &q, &m| *s = (q / n - m * m).max(0.0).sqrt());

        debug!(images = count, "sigma-reject statistics ready");
        let fresh = self.statistics.set(PassStatistics { mean, sigma, count }).is_ok();
        debug_assert!(fresh, "sigma-reject statistics computed twice");
        Ok(())
    }

    fn finish_all(&self) -> Result<()> {
        let Some(stats) = self.statistics.get() else {
            *self.result.lock() = None;
            return Ok(());
        };

        let mut kept = None;
        let mut hits = None;
        for slot in self.slots.drain() {
            add_into(&mut kept, slot.kept);
            add_into(&mut hits, slot.hits);
        }
        let kept = kept.unwrap_or_else(|| Array3::zeros(stats.mean.raw_dim()));
        let hits = hits.unwrap_or_else(|| Array3::zeros(stats.mean.raw_dim()));

        let (planes, height, width) = stats.mean.dim();
        let mut fallback = 0usize;
        let mut out = ImageBuffer::new(planes, width, height)?;
        for p in 0..planes {
            let mut plane = out.plane_mut(p);
            for ((y, x), v) in plane.indexed_iter_mut() {
                let idx = (p, y, x);
                *v = if hits[idx] > 0 {
                    (kept[idx] / hits[idx] as f64) as f32
                } else {
                    fallback += 1;
                    stats.mean[idx] as f32
                };
            }
        }
        if fallback > 0 {
            warn!(pixels = fallback, "every sample rejected, kept the pass-1 mean");
        }

        normalize_if_requested(&mut out, self.post_stack);
        *self.result.lock() = Some(out);
        Ok(())
    }

    fn result(&self) -> Option<ImageBuffer> {
        self.result.lock().clone()
    }

    fn images_stacked(&self) -> usize {
        self.statistics.get().map_or(0, |s| s.count)
    }
}
