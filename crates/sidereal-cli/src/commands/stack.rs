use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use sidereal_core::config::{AlignmentConfig, RunConfig, StackMethod, StackingConfig};
use sidereal_core::consts::{DEFAULT_SEARCH_SQUARE_SIZE, DEFAULT_SIGMA_REJECT_THRESHOLD};
use sidereal_core::stack::PostStack;

use super::pipeline;

#[derive(Clone, ValueEnum)]
pub enum StackMethodArg {
    Standard,
    SigmaReject,
    Maximum,
    Minimum,
    Calibration,
}

impl From<&StackMethodArg> for StackMethod {
    fn from(arg: &StackMethodArg) -> Self {
        match arg {
            StackMethodArg::Standard => StackMethod::Standard,
            StackMethodArg::SigmaReject => StackMethod::SigmaReject,
            StackMethodArg::Maximum => StackMethod::Maximum,
            StackMethodArg::Minimum => StackMethod::Minimum,
            StackMethodArg::Calibration => StackMethod::Calibration,
        }
    }
}

#[derive(Args)]
pub struct StackArgs {
    /// Input image files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Reference image (file stem); the first file by default
    #[arg(long)]
    pub reference: Option<String>,

    /// Stacking method
    #[arg(long, value_enum, default_value = "standard")]
    pub method: StackMethodArg,

    /// Rejection threshold in standard deviations (sigma-reject)
    #[arg(long, default_value_t = DEFAULT_SIGMA_REJECT_THRESHOLD)]
    pub sigma: f32,

    /// Side of the centered search square in pixels
    #[arg(long, default_value_t = DEFAULT_SEARCH_SQUARE_SIZE)]
    pub square_size: usize,

    /// Accept every square with a correlation peak
    #[arg(long)]
    pub no_check: bool,

    /// Output magnification (2 doubles the resolution)
    #[arg(long, default_value = "1.0")]
    pub scale: f64,

    /// Interpolation kernel (bicubic, lanczos, drizzle)
    #[arg(long)]
    pub interpolator: Option<String>,

    /// Stack into a single plane
    #[arg(long)]
    pub mono: bool,

    /// Scale the result so its brightest sample is 1.0
    #[arg(long)]
    pub normalize: bool,

    /// Worker threads (0 = one per core)
    #[arg(short = 'j', long, default_value = "0")]
    pub threads: usize,

    /// Output file path
    #[arg(short, long, default_value = "stacked.tiff")]
    pub output: PathBuf,
}

pub fn run(args: &StackArgs) -> Result<()> {
    let config = RunConfig {
        inputs: args.files.clone(),
        output: args.output.clone(),
        threads: args.threads,
        alignment: AlignmentConfig {
            reference: args.reference.clone(),
            square_size: args.square_size,
            check_alignment: !args.no_check,
            ..AlignmentConfig::default()
        },
        stacking: StackingConfig {
            method: (&args.method).into(),
            sigma_threshold: args.sigma,
            post_stack: if args.normalize {
                PostStack::Normalize
            } else {
                PostStack::Mean
            },
            monochrome: args.mono,
            scale: args.scale,
            interpolator: args.interpolator.clone(),
            ..StackingConfig::default()
        },
    };
    pipeline::execute(&config)
}
