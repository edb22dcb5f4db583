use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_SIGMA_REJECT_THRESHOLD, SIGMA_REJECT_PASSES};
use crate::geometry::{AffineTransform, IntegerRect};
use crate::interpolate::InterpolatorParams;

/// How registered images are combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum StackMode {
    /// Running sum of the aligned images.
    #[default]
    Standard,
    /// Two passes; pixels farther than `threshold` standard deviations from
    /// the pass-1 mean are left out of the second.
    SigmaReject { threshold: f32 },
    /// Per-pixel maximum, or minimum when `maximum` is false.
    Extremum { maximum: bool },
    /// Unregistered sum, for dark and flat masters.
    Calibration,
}

impl StackMode {
    pub fn sigma_reject() -> Self {
        StackMode::SigmaReject {
            threshold: DEFAULT_SIGMA_REJECT_THRESHOLD,
        }
    }

    pub fn passes(&self) -> u32 {
        match self {
            StackMode::SigmaReject { .. } => SIGMA_REJECT_PASSES,
            _ => 1,
        }
    }

    /// Whether images are resampled through their alignment.
    pub fn uses_alignment(&self) -> bool {
        !matches!(self, StackMode::Calibration)
    }
}

impl std::fmt::Display for StackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackMode::Standard => write!(f, "standard"),
            StackMode::SigmaReject { threshold } => write!(f, "sigma-reject ({:.1} sigma)", threshold),
            StackMode::Extremum { maximum: true } => write!(f, "maximum"),
            StackMode::Extremum { maximum: false } => write!(f, "minimum"),
            StackMode::Calibration => write!(f, "calibration"),
        }
    }
}

/// Finalize-time treatment of the combined buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostStack {
    /// Keep the raw accumulation.
    None,
    /// Divide sums by the number of stacked images.
    #[default]
    Mean,
    /// Scale so the brightest sample is 1.0.
    Normalize,
}

/// List-scoped stacking settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StackingParams {
    /// Region of the reference frame to produce, in destination pixels.
    pub crop: IntegerRect,
    /// Applied before each item's alignment, mapping destination pixels to
    /// reference pixels (e.g. a scaling of 0.5 doubles the resolution).
    pub transform: AffineTransform,
    pub mode: StackMode,
    pub post_stack: PostStack,
    pub monochrome: bool,
    /// Kernel name; the best compatible kernel when `None`.
    pub interpolator: Option<String>,
    pub interpolator_params: InterpolatorParams,
}

impl StackingParams {
    pub fn new(crop: IntegerRect, mode: StackMode) -> Self {
        Self {
            crop,
            transform: AffineTransform::identity(),
            mode,
            post_stack: PostStack::default(),
            monochrome: false,
            interpolator: None,
            interpolator_params: InterpolatorParams::default(),
        }
    }
}
