use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::align::{AlignmentParams, SearchSquare};
use crate::consts::{
    DEFAULT_ALIGN_FREQUENCY_CUTOFF, DEFAULT_ALIGN_PRECISION_THRESHOLD,
    DEFAULT_ALIGN_VALUE_THRESHOLD, DEFAULT_SEARCH_SQUARE_SIZE, DEFAULT_SIGMA_REJECT_THRESHOLD,
};
use crate::error::{Result, SiderealError};
use crate::geometry::{AffineTransform, IntegerRect};
use crate::interpolate::InterpolatorParams;
use crate::stack::{PostStack, StackMode, StackingParams};

/// A complete align-then-stack run, as read from TOML.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    /// Worker threads; 0 uses one per core.
    #[serde(default)]
    pub threads: usize,
    #[serde(default)]
    pub alignment: AlignmentConfig,
    #[serde(default)]
    pub stacking: StackingConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            inputs: vec![PathBuf::from("frame-001.tiff"), PathBuf::from("frame-002.tiff")],
            output: PathBuf::from("stacked.tiff"),
            threads: 0,
            alignment: AlignmentConfig::default(),
            stacking: StackingConfig::default(),
        }
    }
}

/// One correlation square, top-left corner and side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SquareConfig {
    pub name: Option<String>,
    pub x: i32,
    pub y: i32,
    pub size: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Input file stem of the reference; the first input when absent.
    pub reference: Option<String>,
    /// Empty means a single centered square of `square_size`.
    pub squares: Vec<SquareConfig>,
    pub square_size: usize,
    pub cutoff: f64,
    pub precision_threshold: f64,
    pub value_threshold: f64,
    pub check_alignment: bool,
    pub compute_scale: bool,
    pub compute_rotation: bool,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            reference: None,
            squares: Vec::new(),
            square_size: DEFAULT_SEARCH_SQUARE_SIZE,
            cutoff: DEFAULT_ALIGN_FREQUENCY_CUTOFF,
            precision_threshold: DEFAULT_ALIGN_PRECISION_THRESHOLD,
            value_threshold: DEFAULT_ALIGN_VALUE_THRESHOLD,
            check_alignment: true,
            compute_scale: false,
            compute_rotation: false,
        }
    }
}

impl AlignmentConfig {
    /// Alignment parameters for a list whose reference is `reference`
    /// (`width` x `height`).
    pub fn to_params(&self, reference: &str, width: usize, height: usize) -> AlignmentParams {
        let squares = if self.squares.is_empty() {
            vec![SearchSquare::centered(width, height, self.square_size)]
        } else {
            self.squares
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    let name = s.name.clone().unwrap_or_else(|| format!("square-{}", i + 1));
                    SearchSquare::new(name, IntegerRect::new(s.x, s.y, s.size, s.size))
                })
                .collect()
        };
        AlignmentParams {
            reference: Some(reference.to_string()),
            squares,
            cutoff: self.cutoff,
            precision_threshold: self.precision_threshold,
            value_threshold: self.value_threshold,
            check_alignment: self.check_alignment,
            compute_scale: self.compute_scale,
            compute_rotation: self.compute_rotation,
            ..AlignmentParams::default()
        }
    }
}

/// Combination method, flattened for configuration files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackMethod {
    #[default]
    Standard,
    SigmaReject,
    Maximum,
    Minimum,
    Calibration,
}

impl fmt::Display for StackMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackMethod::Standard => write!(f, "Standard"),
            StackMethod::SigmaReject => write!(f, "Sigma Reject"),
            StackMethod::Maximum => write!(f, "Maximum"),
            StackMethod::Minimum => write!(f, "Minimum"),
            StackMethod::Calibration => write!(f, "Calibration"),
        }
    }
}

/// Output rectangle in destination pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropConfig {
    pub x: i32,
    pub y: i32,
    pub width: usize,
    pub height: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackingConfig {
    pub method: StackMethod,
    /// Rejection threshold in standard deviations, for `SigmaReject`.
    pub sigma_threshold: f32,
    pub post_stack: PostStack,
    pub monochrome: bool,
    /// Output magnification; 2.0 doubles the resolution.
    pub scale: f64,
    /// The whole (scaled) reference frame when absent.
    pub crop: Option<CropConfig>,
    /// Kernel name ("bicubic", "lanczos", "drizzle"); best fit when absent.
    pub interpolator: Option<String>,
    pub interpolator_params: InterpolatorParams,
}

impl Default for StackingConfig {
    fn default() -> Self {
        Self {
            method: StackMethod::Standard,
            sigma_threshold: DEFAULT_SIGMA_REJECT_THRESHOLD,
            post_stack: PostStack::default(),
            monochrome: false,
            scale: 1.0,
            crop: None,
            interpolator: None,
            interpolator_params: InterpolatorParams::default(),
        }
    }
}

impl StackingConfig {
    pub fn mode(&self) -> StackMode {
        match self.method {
            StackMethod::Standard => StackMode::Standard,
            StackMethod::SigmaReject => StackMode::SigmaReject {
                threshold: self.sigma_threshold,
            },
            StackMethod::Maximum => StackMode::Extremum { maximum: true },
            StackMethod::Minimum => StackMode::Extremum { maximum: false },
            StackMethod::Calibration => StackMode::Calibration,
        }
    }

    /// Stacking parameters for a reference frame of `width` x `height`.
    pub fn to_params(&self, width: usize, height: usize) -> Result<StackingParams> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(SiderealError::Config(format!(
                "output scale must be positive, got {}",
                self.scale
            )));
        }
        if matches!(self.method, StackMethod::SigmaReject) && self.sigma_threshold <= 0.0 {
            return Err(SiderealError::Config(format!(
                "sigma threshold must be positive, got {}",
                self.sigma_threshold
            )));
        }

        let crop = match self.crop {
            Some(c) => IntegerRect::new(c.x, c.y, c.width, c.height),
            None => IntegerRect::new(
                0,
                0,
                (width as f64 * self.scale).round() as usize,
                (height as f64 * self.scale).round() as usize,
            ),
        };
        let mut params = StackingParams::new(crop, self.mode());
        if self.scale != 1.0 {
            params.transform = AffineTransform::scaling(1.0 / self.scale);
        }
        params.post_stack = self.post_stack;
        params.monochrome = self.monochrome;
        params.interpolator = self.interpolator.clone();
        params.interpolator_params = self.interpolator_params.clone();
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_squares_give_centered_square() {
        let params = AlignmentConfig::default().to_params("ref", 200, 100);
        assert_eq!(params.squares.len(), 1);
        assert_eq!(params.squares[0].rect, IntegerRect::new(68, 18, 64, 64));
        assert_eq!(params.reference.as_deref(), Some("ref"));
    }

    #[test]
    fn scale_sets_crop_and_transform() {
        let config = StackingConfig {
            scale: 2.0,
            ..StackingConfig::default()
        };
        let params = config.to_params(50, 40).unwrap();
        assert_eq!(params.crop, IntegerRect::new(0, 0, 100, 80));
        assert_eq!(params.transform, AffineTransform::scaling(0.5));
    }

    #[test]
    fn zero_scale_is_rejected() {
        let config = StackingConfig {
            scale: 0.0,
            ..StackingConfig::default()
        };
        assert!(matches!(config.to_params(10, 10), Err(SiderealError::Config(_))));
    }
}
