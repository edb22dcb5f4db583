use crate::buffer::ImageBuffer;
use crate::geometry::{AffineTransform, Point};

use super::Kernel;

/// Box-weighted resampling for constant axis-aligned scaling.
///
/// Each destination pixel is a drop whose footprint in the source is the
/// destination pixel scaled by the transform and shrunk by `pixfrac`. The
/// value is the mean of the source pixels under the drop, weighted by the
/// overlapping area.
#[derive(Clone, Copy, Debug)]
pub struct DrizzleKernel {
    half_x: f64,
    half_y: f64,
}

impl DrizzleKernel {
    pub fn new(transform: &AffineTransform, pixfrac: f64) -> Self {
        let pixfrac = if pixfrac > 0.0 { pixfrac.min(1.0) } else { 1.0 };
        Self {
            half_x: transform.m11.abs() * pixfrac / 2.0,
            half_y: transform.m22.abs() * pixfrac / 2.0,
        }
    }
}

/// Overlap of `[lo, hi]` with source pixel `i`, which covers `[i - 0.5, i + 0.5]`.
#[inline]
fn overlap(lo: f64, hi: f64, i: i64) -> f64 {
    let a = lo.max(i as f64 - 0.5);
    let b = hi.min(i as f64 + 0.5);
    (b - a).max(0.0)
}

impl Kernel for DrizzleKernel {
    fn sample(&self, image: &ImageBuffer, plane: usize, at: Point) -> f32 {
        let (w, h) = (image.width() as i64, image.height() as i64);
        let (x_lo, x_hi) = (at.x - self.half_x, at.x + self.half_x);
        let (y_lo, y_hi) = (at.y - self.half_y, at.y + self.half_y);

        let first_x = ((x_lo + 0.5).floor() as i64).max(0);
        let last_x = ((x_hi + 0.5).ceil() as i64 - 1).min(w - 1);
        let first_y = ((y_lo + 0.5).floor() as i64).max(0);
        let last_y = ((y_hi + 0.5).ceil() as i64 - 1).min(h - 1);

        let mut sum = 0.0f64;
        let mut weight = 0.0f64;
        for y in first_y..=last_y {
            let wy = overlap(y_lo, y_hi, y);
            if wy == 0.0 {
                continue;
            }
            for x in first_x..=last_x {
                let k = wy * overlap(x_lo, x_hi, x);
                sum += k * image.get(plane, x as usize, y as usize) as f64;
                weight += k;
            }
        }

        if weight > 0.0 {
            (sum / weight) as f32
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_drop_on_center_is_the_pixel() {
        let image = ImageBuffer::from_fn(1, 4, 4, |_, x, y| (x + 4 * y) as f32).unwrap();
        let k = DrizzleKernel::new(&AffineTransform::identity(), 1.0);
        assert_eq!(k.sample(&image, 0, Point::new(2.0, 1.0)), 6.0);
    }

    #[test]
    fn half_pixel_shift_averages_neighbours() {
        let image = ImageBuffer::from_fn(1, 4, 4, |_, x, _| x as f32).unwrap();
        let k = DrizzleKernel::new(&AffineTransform::identity(), 1.0);
        let v = k.sample(&image, 0, Point::new(1.5, 1.0));
        assert!((v - 1.5).abs() < 1e-6);
    }

    #[test]
    fn upscaled_drop_stays_inside_one_pixel() {
        let image = ImageBuffer::from_fn(1, 4, 4, |_, x, _| x as f32).unwrap();
        let k = DrizzleKernel::new(&AffineTransform::scaling(0.5), 1.0);
        assert_eq!(k.sample(&image, 0, Point::new(2.2, 2.0)), 2.0);
    }
}
