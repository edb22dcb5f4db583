//! Registration of items against a reference by Fourier cross-correlation
//! of search squares.

mod aligner;
pub mod correlate;
mod params;
pub mod solve;

pub use aligner::{AlignOutcome, Aligner};
pub use correlate::{correlate, PeakFit};
pub use params::{AlignmentParams, AlignmentResult, SearchSquare};
pub use solve::{solve_transform, SquareMatch};
