use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiderealError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid image dimensions: {width}x{height} with {planes} plane(s)")]
    InvalidDimensions {
        width: usize,
        height: usize,
        planes: usize,
    },

    #[error("Incompatible buffers: {0}")]
    IncompatibleBuffers(String),

    #[error("Empty item list")]
    EmptySequence,

    #[error("No reference item configured")]
    MissingReference,

    #[error("Reference item '{0}' cannot produce a sample")]
    ReferenceUnavailable(String),

    #[error("Item '{0}' cannot be read")]
    UnreadableItem(String),

    #[error("No interpolator is compatible with {0}")]
    NoCompatibleInterpolator(String),

    #[error("Unknown interpolator: {0}")]
    UnknownInterpolator(String),

    #[error("Allocation of {bytes} bytes failed")]
    Allocation { bytes: usize },

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Processing was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SiderealError>;
