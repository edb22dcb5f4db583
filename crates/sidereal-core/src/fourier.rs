//! 2-D discrete Fourier transforms of image samples.
//!
//! Transforms run as a row pass then a column pass of 1-D `rustfft` plans.
//! Large arrays spread the passes over the Rayon pool.

use std::sync::Arc;

use ndarray::{Array2, ArrayView2, Axis};
use num_complex::Complex;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};

use crate::buffer::ImageBuffer;
use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{Result, SiderealError};
use crate::geometry::{IntegerPoint, IntegerRect, IntegerSize};

type Plan = Arc<dyn Fft<f64>>;

/// Allocate a zeroed complex array, reporting exhaustion instead of aborting.
fn try_zeros(h: usize, w: usize) -> Result<Array2<Complex<f64>>> {
    let len = h.checked_mul(w).ok_or(SiderealError::Allocation { bytes: usize::MAX })?;
    let bytes = len.saturating_mul(std::mem::size_of::<Complex<f64>>());
    let mut data: Vec<Complex<f64>> = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| SiderealError::Allocation { bytes })?;
    data.resize(len, Complex::new(0.0, 0.0));
    Array2::from_shape_vec((h, w), data)
        .map_err(|e| SiderealError::IncompatibleBuffers(e.to_string()))
}

/// Run `row_plan` over every row then `col_plan` over every column.
fn transform_in_place(work: &mut Array2<Complex<f64>>, row_plan: &Plan, col_plan: &Plan) {
    let (h, w) = work.dim();
    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        transform_parallel(work, row_plan, col_plan);
    } else {
        transform_sequential(work, row_plan, col_plan);
    }
}

fn process_lane(plan: &Plan, mut lane: ndarray::ArrayViewMut1<'_, Complex<f64>>) {
    if let Some(slice) = lane.as_slice_mut() {
        plan.process(slice);
        return;
    }
    let mut scratch = lane.to_vec();
    plan.process(&mut scratch);
    for (dst, src) in lane.iter_mut().zip(scratch) {
        *dst = src;
    }
}

fn transform_parallel(work: &mut Array2<Complex<f64>>, row_plan: &Plan, col_plan: &Plan) {
    work.axis_iter_mut(Axis(0))
        .into_par_iter()
        .for_each(|row| process_lane(row_plan, row));
    work.axis_iter_mut(Axis(1))
        .into_par_iter()
        .for_each(|col| process_lane(col_plan, col));
}

fn transform_sequential(work: &mut Array2<Complex<f64>>, row_plan: &Plan, col_plan: &Plan) {
    for row in work.axis_iter_mut(Axis(0)) {
        process_lane(row_plan, row);
    }
    for col in work.axis_iter_mut(Axis(1)) {
        process_lane(col_plan, col);
    }
}

/// 2-D forward FFT of a real plane.
pub fn fft2d_forward(data: ArrayView2<'_, f32>) -> Result<Array2<Complex<f64>>> {
    let (h, w) = data.dim();
    let mut planner = FftPlanner::new();
    let row_plan = planner.plan_fft_forward(w);
    let col_plan = planner.plan_fft_forward(h);

    let mut result = try_zeros(h, w)?;
    result.zip_mut_with(&data, |c, &v| *c = Complex::new(v as f64, 0.0));
    transform_in_place(&mut result, &row_plan, &col_plan);
    Ok(result)
}

/// 2-D inverse FFT, returning the real part normalized by `1/(h*w)`.
pub fn ifft2d_inverse(data: &Array2<Complex<f64>>) -> Result<Array2<f64>> {
    let (h, w) = data.dim();
    let plans = InversePlans::new(h, w);
    plans.run(data)
}

struct InversePlans {
    row: Plan,
    col: Plan,
}

impl InversePlans {
    fn new(h: usize, w: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            row: planner.plan_fft_inverse(w),
            col: planner.plan_fft_inverse(h),
        }
    }

    fn run(&self, data: &Array2<Complex<f64>>) -> Result<Array2<f64>> {
        let (h, w) = data.dim();
        let mut work = try_zeros(h, w)?;
        work.assign(data);
        transform_in_place(&mut work, &self.row, &self.col);
        let scale = 1.0 / (h * w) as f64;
        Ok(work.mapv(|c| c.re * scale))
    }
}

/// Frequency index `k` of an `n`-point transform as a signed frequency.
#[inline]
fn signed_frequency(k: usize, n: usize) -> i64 {
    if k <= n / 2 {
        k as i64
    } else {
        k as i64 - n as i64
    }
}

/// Spectra of every plane of an image sample.
pub struct FourierBuffer {
    planes: Vec<Array2<Complex<f64>>>,
    width: usize,
    height: usize,
    inverse: Option<InversePlans>,
}

impl std::fmt::Debug for FourierBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FourierBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("planes", &self.planes.len())
            .field("prepared_inverse", &self.inverse.is_some())
            .finish()
    }
}

impl FourierBuffer {
    /// Forward transform of every plane of `image`.
    ///
    /// With `prepare_inverse` the inverse plans are built up front so that
    /// [`Self::correlate`] and [`Self::to_image`] do not plan again.
    pub fn from_image(image: &ImageBuffer, prepare_inverse: bool) -> Result<Self> {
        let planes = (0..image.planes())
            .map(|p| fft2d_forward(image.plane(p)))
            .collect::<Result<Vec<_>>>()?;
        let (width, height) = (image.width(), image.height());
        Ok(Self {
            planes,
            width,
            height,
            inverse: prepare_inverse.then(|| InversePlans::new(height, width)),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn planes(&self) -> usize {
        self.planes.len()
    }

    pub fn spectrum(&self, plane: usize) -> &Array2<Complex<f64>> {
        &self.planes[plane]
    }

    pub fn memory_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.planes.len() * self.width * self.height * std::mem::size_of::<Complex<f64>>()
    }

    /// Zero every frequency farther than `cutoff` from the origin, and the
    /// DC term. A cutoff of 0 keeps all frequencies except DC.
    pub fn apply_cutoff(&mut self, cutoff: u32) {
        let (h, w) = (self.height, self.width);
        let limit = (cutoff as i64) * (cutoff as i64);
        for spectrum in &mut self.planes {
            spectrum[[0, 0]] = Complex::new(0.0, 0.0);
            if cutoff == 0 {
                continue;
            }
            for ((r, c), v) in spectrum.indexed_iter_mut() {
                let fy = signed_frequency(r, h);
                let fx = signed_frequency(c, w);
                if fx * fx + fy * fy > limit {
                    *v = Complex::new(0.0, 0.0);
                }
            }
        }
    }

    /// Spatial-domain energy `sum(x^2)` of a plane, by Parseval.
    pub fn energy(&self, plane: usize) -> f64 {
        let n = (self.width * self.height) as f64;
        self.planes[plane].iter().map(|c| c.norm_sqr()).sum::<f64>() / n
    }

    /// Circular cross-correlation surface of one plane against `reference`.
    ///
    /// The value at `(dy, dx)` is `sum(self(x + d) * reference(x))`, so a
    /// peak at `d` means this sample is displaced by `d` from the reference.
    pub fn correlate(&self, reference: &FourierBuffer, plane: usize) -> Result<Array2<f64>> {
        if self.width != reference.width || self.height != reference.height {
            return Err(SiderealError::IncompatibleBuffers(format!(
                "spectra {}x{} vs {}x{}",
                self.width, self.height, reference.width, reference.height
            )));
        }
        let own = &self.planes[plane.min(self.planes.len() - 1)];
        let other = &reference.planes[plane.min(reference.planes.len() - 1)];

        let mut cross = try_zeros(self.height, self.width)?;
        ndarray::Zip::from(&mut cross)
            .and(own)
            .and(other)
            .for_each(|c, &a, &b| *c = a * b.conj());

        match &self.inverse {
            Some(plans) => plans.run(&cross),
            None => ifft2d_inverse(&cross),
        }
    }

    /// Back to the spatial domain.
    pub fn to_image(&self) -> Result<ImageBuffer> {
        let mut image = ImageBuffer::new(self.planes.len(), self.width, self.height)?;
        for (p, spectrum) in self.planes.iter().enumerate() {
            let real = match &self.inverse {
                Some(plans) => plans.run(spectrum)?,
                None => ifft2d_inverse(spectrum)?,
            };
            image
                .plane_mut(p)
                .zip_mut_with(&real, |d, &v| *d = v as f32);
        }
        Ok(image)
    }
}

/// Smallest size >= `side` whose only prime factors are 2, 3, 5 and 7.
pub fn adjust_fft_side(side: usize) -> usize {
    let mut n = side.max(1);
    loop {
        let mut m = n;
        for p in [2, 3, 5, 7] {
            while m % p == 0 {
                m /= p;
            }
        }
        if m == 1 {
            return n;
        }
        n += 1;
    }
}

/// Grow a rectangle to FFT-friendly sides, keeping its center.
pub fn adjust_fft_rect(rect: IntegerRect) -> IntegerRect {
    let w = adjust_fft_side(rect.width());
    let h = adjust_fft_side(rect.height());
    IntegerRect {
        origin: IntegerPoint::new(
            rect.origin.x - ((w - rect.width()) / 2) as i32,
            rect.origin.y - ((h - rect.height()) / 2) as i32,
        ),
        size: IntegerSize::new(w, h),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fft_side_is_smooth() {
        assert_eq!(adjust_fft_side(64), 64);
        assert_eq!(adjust_fft_side(11), 12);
        assert_eq!(adjust_fft_side(13), 14);
        assert_eq!(adjust_fft_side(97), 98);
        assert_eq!(adjust_fft_side(0), 1);
    }

    #[test]
    fn rect_grows_around_center() {
        let r = adjust_fft_rect(IntegerRect::new(10, 10, 11, 13));
        assert_eq!(r.size, IntegerSize::new(12, 14));
        assert_eq!(r.origin, IntegerPoint::new(10, 10));
        let r = adjust_fft_rect(IntegerRect::new(10, 10, 17, 17));
        assert_eq!(r.size, IntegerSize::new(18, 18));
    }

    #[test]
    fn forward_then_inverse_restores_plane() {
        let image = ImageBuffer::from_fn(1, 6, 5, |_, x, y| (x * 3 + y * 7 % 5) as f32).unwrap();
        let spectrum = FourierBuffer::from_image(&image, true).unwrap();
        let back = spectrum.to_image().unwrap();
        for y in 0..5 {
            for x in 0..6 {
                assert!((back.get(0, x, y) - image.get(0, x, y)).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn signed_frequencies_wrap() {
        assert_eq!(signed_frequency(0, 8), 0);
        assert_eq!(signed_frequency(4, 8), 4);
        assert_eq!(signed_frequency(5, 8), -3);
        assert_eq!(signed_frequency(7, 8), -1);
    }

    #[test]
    fn parseval_energy_matches_spatial_sum() {
        let image = ImageBuffer::from_fn(1, 4, 4, |_, x, y| (x + y) as f32).unwrap();
        let spectrum = FourierBuffer::from_image(&image, false).unwrap();
        let direct: f64 = image.plane(0).iter().map(|&v| (v as f64) * (v as f64)).sum();
        assert!((spectrum.energy(0) - direct).abs() < 1e-9);
    }
}
