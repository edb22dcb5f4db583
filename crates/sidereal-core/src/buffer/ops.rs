//! Arithmetic operators on [`ImageBuffer`].
//!
//! Operand buffers must have the same size as the receiver and either the
//! same number of planes or a single plane, which is then applied to every
//! plane of the receiver. This is a caller precondition: it is only asserted
//! in debug builds. Use [`ImageBuffer::check_compatible`] to validate up front.

use ndarray::{s, ArrayView2, ArrayViewMut2, Zip};

use crate::consts::EPSILON;
use crate::geometry::IntegerPoint;

use super::{ImageBuffer, OperatorStrategy};

fn zip_binary<F>(
    strategy: OperatorStrategy,
    mut dst: ArrayViewMut2<'_, f32>,
    src: ArrayView2<'_, f32>,
    op: &F,
) where
    F: Fn(&mut f32, f32) + Sync + Send,
{
    let zip = Zip::from(&mut dst).and(&src);
    match strategy {
        OperatorStrategy::Standard => zip.for_each(|d, &s| op(d, s)),
        OperatorStrategy::Parallelized => zip.par_for_each(|d, &s| op(d, s)),
    }
}

fn zip_unary<F>(strategy: OperatorStrategy, mut dst: ArrayViewMut2<'_, f32>, op: &F)
where
    F: Fn(&mut f32) + Sync + Send,
{
    let zip = Zip::from(&mut dst);
    match strategy {
        OperatorStrategy::Standard => zip.for_each(op),
        OperatorStrategy::Parallelized => zip.par_for_each(op),
    }
}

impl ImageBuffer {
    /// Combine every pixel with the operand pixel located at `at` in it.
    fn apply_binary<F>(&mut self, operand: &ImageBuffer, at: IntegerPoint, op: F)
    where
        F: Fn(&mut f32, f32) + Sync + Send,
    {
        let (w, h) = (self.width, self.height());
        let (ox, oy) = (at.x as usize, at.y as usize);
        debug_assert!(operand.planes() == self.planes() || operand.planes() == 1);
        debug_assert!(ox + w <= operand.width() && oy + h <= operand.height());

        for p in 0..self.planes() {
            let q = if operand.planes() == 1 { 0 } else { p };
            let dst = self.data.slice_mut(s![p, .., ..w]);
            let src = operand.data.slice(s![q, oy..oy + h, ox..ox + w]);
            zip_binary(self.strategy, dst, src, &op);
        }
        self.invalidate_levels();
    }

    fn apply_unary<F>(&mut self, op: F)
    where
        F: Fn(&mut f32) + Sync + Send,
    {
        let w = self.width;
        for p in 0..self.planes() {
            zip_unary(self.strategy, self.data.slice_mut(s![p, .., ..w]), &op);
        }
        self.invalidate_levels();
    }

    /// Apply a per-plane operation, `op(plane, value)`.
    fn apply_per_plane<F>(&mut self, op: F)
    where
        F: Fn(usize, &mut f32) + Sync + Send,
    {
        let w = self.width;
        for p in 0..self.planes() {
            let plane_op = |v: &mut f32| op(p, v);
            zip_unary(self.strategy, self.data.slice_mut(s![p, .., ..w]), &plane_op);
        }
        self.invalidate_levels();
    }

    /// `self += image`.
    pub fn add(&mut self, image: &ImageBuffer) {
        debug_assert!(self.same_size(image));
        self.apply_binary(image, IntegerPoint::default(), |d, s| *d += s);
    }

    /// `self -= image`.
    pub fn subtract(&mut self, image: &ImageBuffer) {
        debug_assert!(self.same_size(image));
        self.apply_binary(image, IntegerPoint::default(), |d, s| *d -= s);
    }

    /// `self *= term`, a single-plane term multiplies every plane.
    pub fn multiply(&mut self, term: &ImageBuffer) {
        debug_assert!(self.is_compatible(term));
        self.apply_binary(term, IntegerPoint::default(), |d, s| *d *= s);
    }

    /// `self /= denom`, a single-plane denominator divides every plane.
    ///
    /// Zero denominators yield IEEE infinities or NaN.
    pub fn divide(&mut self, denom: &ImageBuffer) {
        debug_assert!(self.is_compatible(denom));
        self.apply_binary(denom, IntegerPoint::default(), |d, s| *d /= s);
    }

    /// Multiply every sample by `scalar`.
    pub fn multiply_scalar(&mut self, scalar: f64) {
        let k = scalar as f32;
        self.apply_unary(|v| *v *= k);
    }

    /// `(value - bias) * scale` on every sample.
    pub fn subtract_bias_and_scale(&mut self, bias: f64, scale: f64) {
        let (b, k) = (bias as f32, scale as f32);
        self.apply_unary(|v| *v = (*v - b) * k);
    }

    /// Multiply by `factor`, or rescale to a maximum of 1.0 when `factor` is 0.
    ///
    /// With a zero factor and `mono == false` each plane is divided by its
    /// own maximum, which levels the color planes. With `mono == true` all
    /// planes are divided by the global maximum. Planes whose maximum is not
    /// positive are left untouched.
    pub fn normalize(&mut self, factor: f64, mono: bool) {
        if factor != 0.0 {
            self.multiply_scalar(factor);
            return;
        }

        let maxima: Vec<f32> = if mono {
            let (_, max) = self.levels();
            vec![max as f32; self.planes()]
        } else {
            (0..self.planes())
                .map(|p| self.plane_levels(p).1 as f32)
                .collect()
        };

        self.apply_per_plane(|p, v| {
            let m = maxima[p];
            if m > EPSILON {
                *v /= m;
            }
        });
    }

    /// Subtract a dark frame and divide by a flat field.
    ///
    /// Both frames cover the full sensor; `origin` is the position of this
    /// image inside them. Flat samples too close to zero leave the pixel
    /// undivided.
    pub fn calibrate(
        &mut self,
        dark: Option<&ImageBuffer>,
        flat: Option<&ImageBuffer>,
        origin: IntegerPoint,
    ) {
        if let Some(dark) = dark {
            self.apply_binary(dark, origin, |d, s| *d -= s);
        }
        if let Some(flat) = flat {
            self.apply_binary(flat, origin, |d, s| {
                if s.abs() > EPSILON {
                    *d /= s;
                }
            });
        }
    }

    /// Per-pixel minimum or maximum with `image`.
    pub fn keep_extremum(&mut self, image: &ImageBuffer, maximum: bool) {
        debug_assert!(self.is_compatible(image));
        if maximum {
            self.apply_binary(image, IntegerPoint::default(), |d, s| *d = d.max(s));
        } else {
            self.apply_binary(image, IntegerPoint::default(), |d, s| *d = d.min(s));
        }
    }
}
