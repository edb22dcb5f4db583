/// Minimum pixel count (h*w) to use row-level Rayon parallelism in the FFTs.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Maximum number of color planes an image buffer can hold.
pub const MAX_PLANES: usize = 3;

/// Line widths are padded to a multiple of this many samples.
pub const LINE_PADDING: usize = 4;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// Default frequency cutoff, as a fraction of the search square side.
pub const DEFAULT_ALIGN_FREQUENCY_CUTOFF: f64 = 0.41;

/// Default maximum correlation peak standard deviation (pixels) for a
/// successful alignment.
pub const DEFAULT_ALIGN_PRECISION_THRESHOLD: f64 = 4.0;

/// Default minimum normalized correlation peak height.
pub const DEFAULT_ALIGN_VALUE_THRESHOLD: f64 = 0.3;

/// Default search square side in pixels.
pub const DEFAULT_SEARCH_SQUARE_SIZE: usize = 64;

/// Default sigma-reject threshold, in standard deviations.
pub const DEFAULT_SIGMA_REJECT_THRESHOLD: f32 = 2.0;

/// Default Lanczos kernel half-width, in source pixels.
pub const DEFAULT_LANCZOS_HALF_WIDTH: f64 = 3.0;

/// Catmull-Rom parameter of the bicubic kernel.
pub const BICUBIC_A: f32 = -0.5;

/// Number of passes needed by the sigma-reject strategy.
pub const SIGMA_REJECT_PASSES: u32 = 2;
