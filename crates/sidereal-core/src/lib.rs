//! Registration and stacking of astronomical exposures.
//!
//! Images are held as planar [`buffer::ImageBuffer`]s, registered against a
//! reference by correlating the spectra of small search squares, resampled
//! through an [`interpolate::Interpolator`] and combined by a stacking
//! strategy running on a pool of workers.

pub mod align;
pub mod buffer;
pub mod config;
pub mod consts;
pub mod enumerate;
pub mod error;
pub mod fourier;
pub mod geometry;
pub mod interpolate;
pub mod io;
pub mod item;
pub mod process;
pub mod stack;
pub mod sync;

pub use error::{Result, SiderealError};
