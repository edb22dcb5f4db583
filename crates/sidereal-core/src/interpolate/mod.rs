//! Sub-pixel resampling.
//!
//! An interpolator reads a source [`ImageBuffer`] through an affine transform
//! that maps destination coordinates to source coordinates. Destination
//! coordinates are relative to an extraction rectangle, and each plane may
//! carry an extra offset in source space.
//!
//! Kernels advertise a compatibility score for a requested scaling category
//! and transform; [`rank_interpolators`] orders them and
//! [`best_interpolator`] picks the winner.

mod bicubic;
mod drizzle;
mod lanczos;

use serde::{Deserialize, Serialize};

use crate::buffer::ImageBuffer;
use crate::consts::DEFAULT_LANCZOS_HALF_WIDTH;
use crate::error::{Result, SiderealError};
use crate::geometry::{AffineTransform, IntegerRect, Point};

pub use bicubic::BicubicKernel;
pub use drizzle::DrizzleKernel;
pub use lanczos::LanczosKernel;

/// Kind of scaling applied to the source, used to state kernel capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scaling {
    /// Not an affine transform.
    VariableDownScaling,
    ConstantDownScaling,
    /// Scaling is whatever the transform says.
    UseTransform,
    ConstantUpScaling,
    /// Not an affine transform.
    VariableUpScaling,
}

impl Scaling {
    /// Category of a destination-to-source transform.
    ///
    /// A uniform axis-aligned factor below 1 means each destination pixel
    /// covers less than one source pixel, i.e. the image is enlarged.
    pub fn from_transform(transform: &AffineTransform) -> Self {
        match transform.uniform_scale() {
            Some(s) if s < 1.0 - 1e-9 => Scaling::ConstantUpScaling,
            Some(s) if s > 1.0 + 1e-9 => Scaling::ConstantDownScaling,
            _ => Scaling::UseTransform,
        }
    }
}

/// Kernel-specific parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolatorParams {
    /// Lanczos half-width along x, in source pixels.
    pub lanczos_ax: f64,
    /// Lanczos half-width along y, in source pixels.
    pub lanczos_ay: f64,
    /// Lanczos kernel stretch; values above 1 low-pass the source.
    pub lanczos_scale: f64,
    /// Drizzle drop size as a fraction of the destination pixel (0, 1].
    pub drizzle_pixfrac: f64,
}

impl Default for InterpolatorParams {
    fn default() -> Self {
        Self {
            lanczos_ax: DEFAULT_LANCZOS_HALF_WIDTH,
            lanczos_ay: DEFAULT_LANCZOS_HALF_WIDTH,
            lanczos_scale: 1.0,
            drizzle_pixfrac: 1.0,
        }
    }
}

/// The available kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterpolatorKind {
    Bicubic,
    Lanczos,
    Drizzle,
}

impl std::fmt::Display for InterpolatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl InterpolatorKind {
    pub const ALL: [InterpolatorKind; 3] = [
        InterpolatorKind::Bicubic,
        InterpolatorKind::Lanczos,
        InterpolatorKind::Drizzle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            InterpolatorKind::Bicubic => "bicubic",
            InterpolatorKind::Lanczos => "lanczos",
            InterpolatorKind::Drizzle => "drizzle",
        }
    }

    /// Resolve a kernel by its registered name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| SiderealError::UnknownInterpolator(name.to_string()))
    }

    /// Compatibility level with a scaling request; 0 is incompatible,
    /// higher is better.
    pub fn compatibility(&self, scaling: Scaling, transform: &AffineTransform) -> u32 {
        match (self, scaling) {
            (_, Scaling::VariableDownScaling | Scaling::VariableUpScaling) => 0,
            (InterpolatorKind::Bicubic, Scaling::UseTransform) => 3,
            (InterpolatorKind::Bicubic, _) => 2,
            (InterpolatorKind::Lanczos, Scaling::ConstantDownScaling) => 3,
            (InterpolatorKind::Lanczos, Scaling::UseTransform) => 2,
            (InterpolatorKind::Lanczos, Scaling::ConstantUpScaling) => 1,
            (InterpolatorKind::Drizzle, _) if transform.uniform_scale().is_none() => 0,
            (InterpolatorKind::Drizzle, Scaling::ConstantUpScaling) => 4,
            (InterpolatorKind::Drizzle, Scaling::UseTransform) => 1,
            (InterpolatorKind::Drizzle, Scaling::ConstantDownScaling) => 0,
        }
    }

    /// Create an interpolator over `image`.
    ///
    /// `offsets`, when given, holds one source-space offset per plane.
    pub fn build<'a>(
        &self,
        image: &'a ImageBuffer,
        rect: IntegerRect,
        n_planes: usize,
        transform: &AffineTransform,
        offsets: Option<&[Point]>,
        params: &InterpolatorParams,
    ) -> Box<dyn Interpolator + 'a> {
        let geometry = SampleGeometry::new(rect, n_planes, *transform, offsets);
        match self {
            InterpolatorKind::Bicubic => Box::new(KernelInterpolator {
                image,
                geometry,
                kernel: BicubicKernel,
            }),
            InterpolatorKind::Lanczos => Box::new(KernelInterpolator {
                image,
                geometry,
                kernel: LanczosKernel::new(
                    params.lanczos_ax,
                    params.lanczos_ay,
                    params.lanczos_scale,
                ),
            }),
            InterpolatorKind::Drizzle => Box::new(KernelInterpolator {
                image,
                geometry,
                kernel: DrizzleKernel::new(transform, params.drizzle_pixfrac),
            }),
        }
    }
}

/// Every compatible kernel with its score, best first.
pub fn rank_interpolators(
    scaling: Scaling,
    transform: &AffineTransform,
) -> Vec<(InterpolatorKind, u32)> {
    let mut ranked: Vec<(InterpolatorKind, u32)> = InterpolatorKind::ALL
        .into_iter()
        .map(|k| (k, k.compatibility(scaling, transform)))
        .filter(|&(_, score)| score > 0)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// The highest-scoring kernel for a scaling request.
pub fn best_interpolator(
    scaling: Scaling,
    transform: &AffineTransform,
) -> Result<InterpolatorKind> {
    rank_interpolators(scaling, transform)
        .first()
        .map(|&(k, _)| k)
        .ok_or_else(|| {
            SiderealError::NoCompatibleInterpolator(format!("{:?} with {}", scaling, transform))
        })
}

/// Kernel named in `name` if any, else the best kernel for `transform`.
///
/// A named kernel that scores 0 for the transform is rejected.
pub fn resolve_interpolator(
    name: Option<&str>,
    transform: &AffineTransform,
) -> Result<InterpolatorKind> {
    let scaling = Scaling::from_transform(transform);
    match name {
        Some(name) => {
            let kind = InterpolatorKind::from_name(name)?;
            if kind.compatibility(scaling, transform) == 0 {
                return Err(SiderealError::NoCompatibleInterpolator(format!(
                    "{} ({:?} with {})",
                    kind, scaling, transform
                )));
            }
            Ok(kind)
        }
        None => best_interpolator(scaling, transform),
    }
}

/// Sampling engine over one source image.
pub trait Interpolator: Send + Sync {
    /// Destination rectangle.
    fn rect(&self) -> IntegerRect;

    /// Number of planes produced.
    fn planes(&self) -> usize;

    /// Value at `(x, y)`, relative to the destination rectangle.
    fn interpolate(&self, plane: usize, x: f64, y: f64) -> f32;

    /// Values at `(x, y)`, `(x + 1, y)`, ... filling `out`.
    fn interpolate_run(&self, plane: usize, x: f64, y: f64, out: &mut [f32]) {
        for (i, v) in out.iter_mut().enumerate() {
            *v = self.interpolate(plane, x + i as f64, y);
        }
    }

    /// Resample the whole destination rectangle into a new buffer.
    fn resample(&self) -> Result<ImageBuffer> {
        let rect = self.rect();
        let (w, h) = (rect.width(), rect.height());
        let mut out = ImageBuffer::new(self.planes(), w, h)?;
        let mut line = vec![0.0f32; w];
        for p in 0..self.planes() {
            let mut plane = out.plane_mut(p);
            for y in 0..h {
                self.interpolate_run(p, 0.0, y as f64, &mut line);
                for (x, &v) in line.iter().enumerate() {
                    plane[[y, x]] = v;
                }
            }
        }
        Ok(out)
    }
}

/// Kernel evaluated at a source-space point of one source plane.
pub trait Kernel: Send + Sync {
    fn sample(&self, image: &ImageBuffer, plane: usize, at: Point) -> f32;
}

/// Destination-to-source mapping shared by every kernel.
#[derive(Clone, Debug)]
struct SampleGeometry {
    rect: IntegerRect,
    n_planes: usize,
    transform: AffineTransform,
    offsets: Vec<Point>,
}

impl SampleGeometry {
    fn new(
        rect: IntegerRect,
        n_planes: usize,
        transform: AffineTransform,
        offsets: Option<&[Point]>,
    ) -> Self {
        Self {
            rect,
            n_planes,
            transform,
            offsets: offsets.map(|o| o.to_vec()).unwrap_or_default(),
        }
    }

    fn source_point(&self, plane: usize, x: f64, y: f64) -> Point {
        let p = self.transform.apply(Point::new(
            self.rect.origin.x as f64 + x,
            self.rect.origin.y as f64 + y,
        ));
        match self.offsets.get(plane) {
            Some(o) => Point::new(p.x + o.x, p.y + o.y),
            None => p,
        }
    }
}

struct KernelInterpolator<'a, K> {
    image: &'a ImageBuffer,
    geometry: SampleGeometry,
    kernel: K,
}

impl<K: Kernel> Interpolator for KernelInterpolator<'_, K> {
    fn rect(&self) -> IntegerRect {
        self.geometry.rect
    }

    fn planes(&self) -> usize {
        self.geometry.n_planes
    }

    fn interpolate(&self, plane: usize, x: f64, y: f64) -> f32 {
        let source_planes = self.image.planes();
        if self.geometry.n_planes == 1 && source_planes > 1 {
            let sum: f32 = (0..source_planes)
                .map(|p| {
                    let at = self.geometry.source_point(p, x, y);
                    self.kernel.sample(self.image, p, at)
                })
                .sum();
            return sum / source_planes as f32;
        }
        let source_plane = plane.min(source_planes - 1);
        let at = self.geometry.source_point(plane, x, y);
        self.kernel.sample(self.image, source_plane, at)
    }
}

/// Clamp a pixel index into `[0, size)`.
#[inline]
pub(crate) fn clamp_index(i: i64, size: usize) -> usize {
    i.clamp(0, size as i64 - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_scaling_has_no_kernel() {
        let t = AffineTransform::identity();
        assert!(rank_interpolators(Scaling::VariableUpScaling, &t).is_empty());
        assert!(best_interpolator(Scaling::VariableDownScaling, &t).is_err());
    }

    #[test]
    fn bicubic_is_default_for_general_transforms() {
        let t = AffineTransform::similarity(1.0, 0.1, 2.0, 3.0);
        let ranked = rank_interpolators(Scaling::UseTransform, &t);
        assert_eq!(ranked[0].0, InterpolatorKind::Bicubic);
        assert!(ranked.iter().all(|(k, _)| *k != InterpolatorKind::Drizzle));
    }

    #[test]
    fn drizzle_wins_constant_upscaling() {
        let t = AffineTransform::scaling(0.5);
        assert_eq!(Scaling::from_transform(&t), Scaling::ConstantUpScaling);
        assert_eq!(
            best_interpolator(Scaling::ConstantUpScaling, &t).unwrap(),
            InterpolatorKind::Drizzle
        );
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(
            InterpolatorKind::from_name("Lanczos").unwrap(),
            InterpolatorKind::Lanczos
        );
        assert!(InterpolatorKind::from_name("nearest").is_err());
        let rotated = AffineTransform::similarity(1.0, 0.2, 0.0, 0.0);
        assert!(resolve_interpolator(Some("drizzle"), &rotated).is_err());
    }
}
