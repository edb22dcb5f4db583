use std::f64::consts::PI;

use crate::buffer::ImageBuffer;
use crate::geometry::Point;

use super::{clamp_index, Kernel};

/// Lanczos kernel with independent half-widths per axis.
///
/// `scale` stretches the kernel: a value of 2 spreads it over twice as many
/// source pixels, which low-passes the source when reducing it.
#[derive(Clone, Copy, Debug)]
pub struct LanczosKernel {
    ax: f64,
    ay: f64,
    scale: f64,
}

/// L(x) = sinc(x) * sinc(x / a) for |x| < a, 0 otherwise.
#[inline]
fn lanczos(x: f64, a: f64) -> f64 {
    if x.abs() < 1e-9 {
        return 1.0;
    }
    if x.abs() >= a {
        return 0.0;
    }
    let pi_x = PI * x;
    let pi_x_a = pi_x / a;
    (pi_x.sin() / pi_x) * (pi_x_a.sin() / pi_x_a)
}

impl LanczosKernel {
    pub fn new(ax: f64, ay: f64, scale: f64) -> Self {
        Self {
            ax: ax.max(1.0),
            ay: ay.max(1.0),
            scale: if scale > 0.0 { scale } else { 1.0 },
        }
    }

    /// First tap and weights along one axis.
    fn taps(&self, coord: f64, a: f64) -> (i64, Vec<f64>) {
        let radius = (a * self.scale).ceil() as i64;
        let center = coord.floor() as i64;
        let first = center - radius + 1;
        let weights = (0..2 * radius)
            .map(|k| lanczos((coord - (first + k) as f64) / self.scale, a))
            .collect();
        (first, weights)
    }
}

impl Kernel for LanczosKernel {
    fn sample(&self, image: &ImageBuffer, plane: usize, at: Point) -> f32 {
        let (w, h) = (image.width(), image.height());

        if self.scale == 1.0 && at.x.fract() == 0.0 && at.y.fract() == 0.0 {
            return image.get(
                plane,
                clamp_index(at.x as i64, w),
                clamp_index(at.y as i64, h),
            );
        }

        let (x_first, wx) = self.taps(at.x, self.ax);
        let (y_first, wy) = self.taps(at.y, self.ay);

        let mut sum = 0.0f64;
        let mut weight = 0.0f64;
        for (j, &wyj) in wy.iter().enumerate() {
            if wyj == 0.0 {
                continue;
            }
            let row = clamp_index(y_first + j as i64, h);
            for (i, &wxi) in wx.iter().enumerate() {
                let k = wxi * wyj;
                sum += k * image.get(plane, clamp_index(x_first + i as i64, w), row) as f64;
                weight += k;
            }
        }

        if weight.abs() > 1e-12 {
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
    fn exact_on_pixel_centers() {
        let image = ImageBuffer::from_fn(1, 6, 6, |_, x, y| (x * 7 + y) as f32).unwrap();
        let k = LanczosKernel::new(3.0, 3.0, 1.0);
        assert_eq!(k.sample(&image, 0, Point::new(2.0, 3.0)), 17.0);
    }

    #[test]
    fn constant_image_stays_constant() {
        let image = ImageBuffer::filled(1, 10, 10, 0.25).unwrap();
        let k = LanczosKernel::new(2.0, 3.0, 1.5);
        let v = k.sample(&image, 0, Point::new(4.3, 5.7));
        assert!((v - 0.25).abs() < 1e-6);
    }
}
