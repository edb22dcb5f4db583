use crate::buffer::ImageBuffer;
use crate::consts::BICUBIC_A;
use crate::geometry::Point;

use super::{clamp_index, Kernel};

/// Catmull-Rom bicubic convolution over a 4x4 neighbourhood.
///
/// Neighbours outside the image repeat the border pixels.
#[derive(Clone, Copy, Debug, Default)]
pub struct BicubicKernel;

/// Cubic convolution weight at distance `x`.
///
/// ```text
/// W(x) = (a+2)|x|^3 - (a+3)|x|^2 + 1       for |x| <= 1
/// W(x) = a|x|^3 - 5a|x|^2 + 8a|x| - 4a     for 1 < |x| < 2
/// W(x) = 0                                  otherwise
/// ```
#[inline]
pub(crate) fn cubic_weight(x: f32) -> f32 {
    let abs_x = x.abs();
    if abs_x <= 1.0 {
        ((BICUBIC_A + 2.0) * abs_x - (BICUBIC_A + 3.0)) * abs_x * abs_x + 1.0
    } else if abs_x < 2.0 {
        ((BICUBIC_A * abs_x - 5.0 * BICUBIC_A) * abs_x + 8.0 * BICUBIC_A) * abs_x
            - 4.0 * BICUBIC_A
    } else {
        0.0
    }
}

impl Kernel for BicubicKernel {
    fn sample(&self, image: &ImageBuffer, plane: usize, at: Point) -> f32 {
        let (w, h) = (image.width(), image.height());
        let x0 = at.x.floor();
        let y0 = at.y.floor();
        let fx = (at.x - x0) as f32;
        let fy = (at.y - y0) as f32;
        let (x0, y0) = (x0 as i64, y0 as i64);

        // Integer position: the kernel reduces to the pixel itself.
        if fx == 0.0 && fy == 0.0 {
            return image.get(plane, clamp_index(x0, w), clamp_index(y0, h));
        }

        let wx = [
            cubic_weight(fx + 1.0),
            cubic_weight(fx),
            cubic_weight(fx - 1.0),
            cubic_weight(fx - 2.0),
        ];
        let wy = [
            cubic_weight(fy + 1.0),
            cubic_weight(fy),
            cubic_weight(fy - 1.0),
            cubic_weight(fy - 2.0),
        ];

        let mut sum = 0.0f32;
        for (j, &wyj) in wy.iter().enumerate() {
            let row = clamp_index(y0 - 1 + j as i64, h);
            let mut line = 0.0f32;
            for (i, &wxi) in wx.iter().enumerate() {
                line += wxi * image.get(plane, clamp_index(x0 - 1 + i as i64, w), row);
            }
            sum += wyj * line;
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_partition_unity() {
        for k in 0..10 {
            let f = k as f32 / 10.0;
            let total = cubic_weight(f + 1.0)
                + cubic_weight(f)
                + cubic_weight(f - 1.0)
                + cubic_weight(f - 2.0);
            assert!((total - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn reproduces_linear_ramp() {
        let image = ImageBuffer::from_fn(1, 8, 8, |_, x, _| x as f32).unwrap();
        let v = BicubicKernel.sample(&image, 0, Point::new(3.25, 4.5));
        assert!((v - 3.25).abs() < 1e-4);
    }
}
