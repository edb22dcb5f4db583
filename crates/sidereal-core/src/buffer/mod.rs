//! Dense planar floating-point image storage.
//!
//! Pixels live in one contiguous `Array3<f32>` of shape
//! `(planes, height, padded_width)`. The padding columns past `width` are kept
//! at zero and never take part in arithmetic.

mod ops;

use std::sync::OnceLock;

use ndarray::{s, Array2, Array3, ArrayView2, ArrayViewMut2};
use serde::{Deserialize, Serialize};

use crate::consts::{LINE_PADDING, MAX_PLANES};
use crate::error::{Result, SiderealError};

/// How the per-pixel operator loops are executed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatorStrategy {
    /// Run in the calling thread.
    #[default]
    Standard,
    /// Split the rows across the Rayon pool.
    Parallelized,
}

/// Planar image buffer with 1 to 3 color planes.
#[derive(Clone, Debug)]
pub struct ImageBuffer {
    data: Array3<f32>,
    width: usize,
    strategy: OperatorStrategy,
    /// Per-plane (min, max), computed on first request.
    levels: OnceLock<Vec<(f64, f64)>>,
}

/// Round a line width up to the padding granularity.
pub fn padded_width(width: usize) -> usize {
    width.div_ceil(LINE_PADDING) * LINE_PADDING
}

fn check_dimensions(planes: usize, width: usize, height: usize) -> Result<()> {
    if planes == 0 || planes > MAX_PLANES || width == 0 || height == 0 {
        return Err(SiderealError::InvalidDimensions {
            width,
            height,
            planes,
        });
    }
    Ok(())
}

impl ImageBuffer {
    /// Allocate a zeroed buffer.
    pub fn new(planes: usize, width: usize, height: usize) -> Result<Self> {
        check_dimensions(planes, width, height)?;
        Ok(Self::from_array_unchecked(
            Array3::zeros((planes, height, padded_width(width))),
            width,
        ))
    }

    /// Allocate a buffer with every sample set to `value`.
    pub fn filled(planes: usize, width: usize, height: usize, value: f32) -> Result<Self> {
        let mut buffer = Self::new(planes, width, height)?;
        buffer.data.slice_mut(s![.., .., ..width]).fill(value);
        Ok(buffer)
    }

    /// Build a buffer whose sample at `(plane, x, y)` is `f(plane, x, y)`.
    pub fn from_fn<F>(planes: usize, width: usize, height: usize, f: F) -> Result<Self>
    where
        F: Fn(usize, usize, usize) -> f32,
    {
        let mut buffer = Self::new(planes, width, height)?;
        for p in 0..planes {
            for y in 0..height {
                for x in 0..width {
                    buffer.data[[p, y, x]] = f(p, x, y);
                }
            }
        }
        Ok(buffer)
    }

    /// Take ownership of pre-existing planar data.
    ///
    /// `data` holds the planes one after the other, each `height` lines of
    /// `line_width` samples. The buffer releases the memory when dropped.
    pub fn from_vec(
        data: Vec<f32>,
        planes: usize,
        width: usize,
        line_width: usize,
        height: usize,
    ) -> Result<Self> {
        check_dimensions(planes, width, height)?;
        if line_width < width || data.len() != planes * height * line_width {
            return Err(SiderealError::IncompatibleBuffers(format!(
                "{} samples cannot hold {} plane(s) of {}x{} with line width {}",
                data.len(),
                planes,
                width,
                height,
                line_width
            )));
        }
        let array = Array3::from_shape_vec((planes, height, line_width), data)
            .map_err(|e| SiderealError::IncompatibleBuffers(e.to_string()))?;
        let mut buffer = if line_width == padded_width(width) {
            Self::from_array_unchecked(array, width)
        } else {
            let mut padded = Self::new(planes, width, height)?;
            padded
                .data
                .slice_mut(s![.., .., ..width])
                .assign(&array.slice(s![.., .., ..width]));
            padded
        };
        buffer.data.slice_mut(s![.., .., width..]).fill(0.0);
        Ok(buffer)
    }

    /// Copy pre-existing planar data; the caller keeps ownership of `data`.
    pub fn from_slice(
        data: &[f32],
        planes: usize,
        width: usize,
        line_width: usize,
        height: usize,
    ) -> Result<Self> {
        Self::from_vec(data.to_vec(), planes, width, line_width, height)
    }

    /// Copy from caller-owned planes, each `height` lines of `line_width` samples.
    pub fn from_planar(
        planes: &[&[f32]],
        width: usize,
        height: usize,
        line_width: usize,
    ) -> Result<Self> {
        let mut buffer = Self::new(planes.len(), width, height)?;
        for (p, plane) in planes.iter().enumerate() {
            if line_width < width || plane.len() < height * line_width {
                return Err(SiderealError::IncompatibleBuffers(format!(
                    "plane {} is too short for {}x{} with line width {}",
                    p, width, height, line_width
                )));
            }
            for y in 0..height {
                let line = &plane[y * line_width..y * line_width + width];
                for (x, &v) in line.iter().enumerate() {
                    buffer.data[[p, y, x]] = v;
                }
            }
        }
        Ok(buffer)
    }

    /// Single-plane buffer from a `(height, width)` array.
    pub fn from_plane(plane: &Array2<f32>) -> Result<Self> {
        let (h, w) = plane.dim();
        let mut buffer = Self::new(1, w, h)?;
        buffer.data.slice_mut(s![0, .., ..w]).assign(plane);
        Ok(buffer)
    }

    fn from_array_unchecked(data: Array3<f32>, width: usize) -> Self {
        Self {
            data,
            width,
            strategy: OperatorStrategy::Standard,
            levels: OnceLock::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    /// Line stride in samples (>= width).
    pub fn padded_width(&self) -> usize {
        self.data.dim().2
    }

    pub fn planes(&self) -> usize {
        self.data.dim().0
    }

    /// Bytes occupied by the pixel store and the buffer itself.
    pub fn memory_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.data.len() * std::mem::size_of::<f32>()
    }

    pub fn strategy(&self) -> OperatorStrategy {
        self.strategy
    }

    /// Change how operator loops run. Results do not depend on the strategy.
    pub fn set_strategy(&mut self, strategy: OperatorStrategy) {
        self.strategy = strategy;
    }

    pub fn get(&self, plane: usize, x: usize, y: usize) -> f32 {
        self.data[[plane, y, x]]
    }

    pub fn set(&mut self, plane: usize, x: usize, y: usize, value: f32) {
        debug_assert!(x < self.width);
        self.data[[plane, y, x]] = value;
        self.invalidate_levels();
    }

    /// View of one plane, cropped to the image width.
    pub fn plane(&self, plane: usize) -> ArrayView2<'_, f32> {
        self.data.slice(s![plane, .., ..self.width])
    }

    /// Mutable view of one plane; cached levels are discarded.
    pub fn plane_mut(&mut self, plane: usize) -> ArrayViewMut2<'_, f32> {
        self.invalidate_levels();
        let w = self.width;
        self.data.slice_mut(s![plane, .., ..w])
    }

    /// Same size and plane count.
    pub fn same_size(&self, other: &ImageBuffer) -> bool {
        self.width == other.width && self.height() == other.height()
    }

    /// Whether `other` can be an operand of the arithmetic operators.
    pub fn is_compatible(&self, other: &ImageBuffer) -> bool {
        self.same_size(other) && (other.planes() == self.planes() || other.planes() == 1)
    }

    /// Error form of [`Self::is_compatible`], for up-front validation.
    pub fn check_compatible(&self, other: &ImageBuffer) -> Result<()> {
        if self.is_compatible(other) {
            Ok(())
        } else {
            Err(SiderealError::IncompatibleBuffers(format!(
                "{}x{}x{} vs {}x{}x{}",
                self.width,
                self.height(),
                self.planes(),
                other.width,
                other.height(),
                other.planes()
            )))
        }
    }

    /// Forget the cached min/max.
    pub fn reset_levels(&mut self) {
        self.levels = OnceLock::new();
    }

    pub(crate) fn invalidate_levels(&mut self) {
        if self.levels.get().is_some() {
            self.levels = OnceLock::new();
        }
    }

    fn cached_levels(&self) -> &[(f64, f64)] {
        self.levels.get_or_init(|| {
            (0..self.planes())
                .map(|p| {
                    self.plane(p).iter().fold(
                        (f64::INFINITY, f64::NEG_INFINITY),
                        |(lo, hi), &v| (lo.min(v as f64), hi.max(v as f64)),
                    )
                })
                .collect()
        })
    }

    /// Minimum and maximum over all planes.
    pub fn levels(&self) -> (f64, f64) {
        self.cached_levels()
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(a, b)| {
                (lo.min(a), hi.max(b))
            })
    }

    /// Minimum and maximum of one plane.
    pub fn plane_levels(&self, plane: usize) -> (f64, f64) {
        self.cached_levels()[plane]
    }

    /// Value of output plane `plane` at `(x, y)` when converting to `n_planes`.
    ///
    /// Color to mono averages the planes, mono to color replicates the plane.
    fn mapped_sample(&self, n_planes: usize, plane: usize, x: usize, y: usize) -> f32 {
        let own = self.planes();
        if n_planes == own {
            self.data[[plane, y, x]]
        } else if own == 1 {
            self.data[[0, y, x]]
        } else if n_planes == 1 {
            (0..own).map(|p| self.data[[p, y, x]]).sum::<f32>() / own as f32
        } else {
            self.data[[plane.min(own - 1), y, x]]
        }
    }

    /// Copy of this buffer with `n_planes` planes.
    pub fn with_planes(&self, n_planes: usize) -> Result<ImageBuffer> {
        if n_planes == self.planes() {
            return Ok(self.clone());
        }
        let mut out = ImageBuffer::new(n_planes, self.width, self.height())?;
        for p in 0..n_planes {
            for y in 0..self.height() {
                for x in 0..self.width {
                    out.data[[p, y, x]] = self.mapped_sample(n_planes, p, x, y);
                }
            }
        }
        out.strategy = self.strategy;
        Ok(out)
    }

    /// Write the whole image into caller-owned planes of `line_width` samples.
    pub fn convert_to_planar(&self, planes: &mut [&mut [f32]], line_width: usize) {
        self.extract_sample(planes, 0, 0, self.width, self.height(), line_width);
    }

    /// Write the `w` x `h` region at `(x, y)` into caller-owned planes.
    ///
    /// The number of output planes may differ from ours; see
    /// [`Self::with_planes`] for the conversion rule. The region must lie
    /// inside the image.
    pub fn extract_sample(
        &self,
        planes: &mut [&mut [f32]],
        x: usize,
        y: usize,
        w: usize,
        h: usize,
        line_width: usize,
    ) {
        debug_assert!(x + w <= self.width && y + h <= self.height());
        debug_assert!(line_width >= w);
        let n_planes = planes.len();
        for (p, out) in planes.iter_mut().enumerate() {
            for row in 0..h {
                let line = &mut out[row * line_width..row * line_width + w];
                for (col, v) in line.iter_mut().enumerate() {
                    *v = self.mapped_sample(n_planes, p, x + col, y + row);
                }
            }
        }
    }

    /// Set every sample to zero.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.invalidate_levels();
    }

    /// Owned `(planes, height, width)` copy without the padding columns.
    pub fn to_array(&self) -> Array3<f32> {
        self.data.slice(s![.., .., ..self.width]).to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_rounds_up() {
        assert_eq!(padded_width(1), 4);
        assert_eq!(padded_width(4), 4);
        assert_eq!(padded_width(5), 8);
    }

    #[test]
    fn levels_are_invalidated_by_set() {
        let mut b = ImageBuffer::filled(1, 3, 3, 2.0).unwrap();
        assert_eq!(b.levels(), (2.0, 2.0));
        b.set(0, 1, 1, 5.0);
        assert_eq!(b.levels(), (2.0, 5.0));
    }

    #[test]
    fn padding_is_not_counted_in_levels() {
        let b = ImageBuffer::filled(1, 5, 2, -1.0).unwrap();
        assert_eq!(b.padded_width(), 8);
        assert_eq!(b.levels(), (-1.0, -1.0));
    }
}
