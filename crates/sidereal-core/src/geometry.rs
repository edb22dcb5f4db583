use serde::{Deserialize, Serialize};

/// Integer pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntegerPoint {
    pub x: i32,
    pub y: i32,
}

impl IntegerPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Integer pixel extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntegerSize {
    pub width: usize,
    pub height: usize,
}

impl IntegerSize {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned pixel rectangle, origin at the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntegerRect {
    pub origin: IntegerPoint,
    pub size: IntegerSize,
}

impl IntegerRect {
    pub fn new(x: i32, y: i32, width: usize, height: usize) -> Self {
        Self {
            origin: IntegerPoint::new(x, y),
            size: IntegerSize::new(width, height),
        }
    }

    /// Rectangle covering a whole `width` x `height` image.
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> usize {
        self.size.width
    }

    pub fn height(&self) -> usize {
        self.size.height
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i64 {
        self.origin.x as i64 + self.size.width as i64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        self.origin.y as i64 + self.size.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.size.width == 0 || self.size.height == 0
    }

    /// Whether `self` lies entirely inside a `width` x `height` image.
    pub fn fits_in(&self, width: usize, height: usize) -> bool {
        self.origin.x >= 0
            && self.origin.y >= 0
            && self.right() <= width as i64
            && self.bottom() <= height as i64
    }

    /// Center of the rectangle in continuous pixel coordinates.
    pub fn center(&self) -> Point {
        Point::new(
            self.origin.x as f64 + self.size.width as f64 / 2.0,
            self.origin.y as f64 + self.size.height as f64 / 2.0,
        )
    }

    /// Same size, new origin.
    pub fn with_origin(&self, origin: IntegerPoint) -> Self {
        Self {
            origin,
            size: self.size,
        }
    }
}

/// Continuous 2-D coordinates (pixels).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 2-D affine transform.
///
/// A point is mapped as
/// ```text
/// x' = m11 * x + m21 * y + tx
/// y' = m12 * x + m22 * y + ty
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub m11: f64,
    pub m12: f64,
    pub m21: f64,
    pub m22: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::fmt::Display for AffineTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(dx={:.2}, dy={:.2}, rot={:.3}\u{b0}, scale={:.4})",
            self.tx,
            self.ty,
            self.rotation_angle().to_degrees(),
            self.scale_factor()
        )
    }
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self {
            m11: 1.0,
            m12: 0.0,
            m21: 0.0,
            m22: 1.0,
            tx: 0.0,
            ty: 0.0,
        }
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            tx: dx,
            ty: dy,
            ..Self::identity()
        }
    }

    /// Uniform scaling about the origin.
    pub fn scaling(factor: f64) -> Self {
        Self {
            m11: factor,
            m22: factor,
            ..Self::identity()
        }
    }

    /// Rotation by `angle` radians and uniform `scale`, followed by a translation.
    pub fn similarity(scale: f64, angle: f64, dx: f64, dy: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            m11: scale * cos,
            m12: scale * sin,
            m21: -scale * sin,
            m22: scale * cos,
            tx: dx,
            ty: dy,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.m11 * p.x + self.m21 * p.y + self.tx,
            self.m12 * p.x + self.m22 * p.y + self.ty,
        )
    }

    /// Transform that applies `self` first, then `next`.
    pub fn then(&self, next: &AffineTransform) -> AffineTransform {
        AffineTransform {
            m11: next.m11 * self.m11 + next.m21 * self.m12,
            m21: next.m11 * self.m21 + next.m21 * self.m22,
            tx: next.m11 * self.tx + next.m21 * self.ty + next.tx,
            m12: next.m12 * self.m11 + next.m22 * self.m12,
            m22: next.m12 * self.m21 + next.m22 * self.m22,
            ty: next.m12 * self.tx + next.m22 * self.ty + next.ty,
        }
    }

    pub fn determinant(&self) -> f64 {
        self.m11 * self.m22 - self.m21 * self.m12
    }

    /// Inverse transform, `None` when the linear part is singular.
    pub fn inverse(&self) -> Option<AffineTransform> {
        let det = self.determinant();
        if det.abs() < 1e-12 {
            return None;
        }
        let m11 = self.m22 / det;
        let m21 = -self.m21 / det;
        let m12 = -self.m12 / det;
        let m22 = self.m11 / det;
        Some(AffineTransform {
            m11,
            m12,
            m21,
            m22,
            tx: -(m11 * self.tx + m21 * self.ty),
            ty: -(m12 * self.tx + m22 * self.ty),
        })
    }

    /// No rotation or shear: only per-axis scaling and translation.
    pub fn is_axis_aligned(&self) -> bool {
        self.m12.abs() < 1e-9 && self.m21.abs() < 1e-9
    }

    /// The scale factor when the transform is an axis-aligned uniform scaling.
    pub fn uniform_scale(&self) -> Option<f64> {
        if self.is_axis_aligned() && (self.m11 - self.m22).abs() < 1e-9 && self.m11 > 0.0 {
            Some(self.m11)
        } else {
            None
        }
    }

    pub fn scale_factor(&self) -> f64 {
        self.determinant().abs().sqrt()
    }

    pub fn rotation_angle(&self) -> f64 {
        self.m12.atan2(self.m11)
    }

    pub fn translation_components(&self) -> Point {
        Point::new(self.tx, self.ty)
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }
}
