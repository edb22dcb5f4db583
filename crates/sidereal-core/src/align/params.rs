use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_ALIGN_FREQUENCY_CUTOFF, DEFAULT_ALIGN_PRECISION_THRESHOLD,
    DEFAULT_ALIGN_VALUE_THRESHOLD,
};
use crate::geometry::{AffineTransform, IntegerPoint, IntegerRect, Point};

/// Named correlation window shared by every image of the list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchSquare {
    pub name: String,
    pub rect: IntegerRect,
}

impl SearchSquare {
    pub fn new(name: impl Into<String>, rect: IntegerRect) -> Self {
        Self {
            name: name.into(),
            rect,
        }
    }

    /// Square of side `size` centered in a `width` x `height` image.
    pub fn centered(width: usize, height: usize, size: usize) -> Self {
        let side = size.min(width).min(height);
        Self::new(
            "center",
            IntegerRect::new(
                ((width - side) / 2) as i32,
                ((height - side) / 2) as i32,
                side,
                side,
            ),
        )
    }
}

/// List-scoped alignment settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentParams {
    /// Name of the reference item.
    pub reference: Option<String>,
    pub squares: Vec<SearchSquare>,
    /// Per-item square origins, in the order of `squares`, overriding the
    /// shared ones.
    pub item_squares: HashMap<String, Vec<IntegerPoint>>,
    /// Frequency cutoff as a fraction of the square side; the spectra keep
    /// frequencies up to `cutoff * side` discrete units.
    pub cutoff: f64,
    /// Largest accepted standard deviation of the correlation peak, in pixels.
    pub precision_threshold: f64,
    /// Smallest accepted normalized correlation peak.
    pub value_threshold: f64,
    /// Apply the thresholds; when false every square with signal is accepted.
    pub check_alignment: bool,
    pub compute_scale: bool,
    pub compute_rotation: bool,
}

impl Default for AlignmentParams {
    fn default() -> Self {
        Self {
            reference: None,
            squares: Vec::new(),
            item_squares: HashMap::new(),
            cutoff: DEFAULT_ALIGN_FREQUENCY_CUTOFF,
            precision_threshold: DEFAULT_ALIGN_PRECISION_THRESHOLD,
            value_threshold: DEFAULT_ALIGN_VALUE_THRESHOLD,
            check_alignment: true,
            compute_scale: false,
            compute_rotation: false,
        }
    }
}

impl AlignmentParams {
    /// Rectangle of square `index` for the item called `item`.
    pub fn square_rect(&self, index: usize, item: &str) -> IntegerRect {
        let square = &self.squares[index];
        match self.item_squares.get(item).and_then(|o| o.get(index)) {
            Some(&origin) => square.rect.with_origin(origin),
            None => square.rect,
        }
    }

    /// Discrete cutoff radius for a square.
    pub fn discrete_cutoff(&self, rect: &IntegerRect) -> u32 {
        let side = rect.width().min(rect.height()) as f64;
        (self.cutoff * side).max(0.0) as u32
    }
}

/// Registration of one item against the reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Maps reference coordinates to this item's coordinates.
    pub transform: AffineTransform,
    /// Measured displacement per square; `None` where the square failed.
    pub offsets: Vec<Option<Point>>,
    /// Squares that took part in the solve.
    pub squares_used: usize,
    /// Largest peak standard deviation among the used squares.
    pub worst_precision: f64,
}

impl AlignmentResult {
    /// Result of the reference item against itself.
    pub fn identity(squares: usize) -> Self {
        Self {
            transform: AffineTransform::identity(),
            offsets: vec![Some(Point::default()); squares],
            squares_used: squares,
            worst_precision: 0.0,
        }
    }
}
