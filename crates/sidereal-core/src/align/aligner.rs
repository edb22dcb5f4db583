use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Result, SiderealError};
use crate::fourier::{adjust_fft_rect, FourierBuffer};
use crate::geometry::{IntegerPoint, IntegerRect, Point};
use crate::item::{ImageList, ProcessableItem};

use super::correlate::correlate;
use super::params::{AlignmentParams, AlignmentResult};
use super::solve::{solve_transform, SquareMatch};

/// Lazily computed, then immutable, reference spectrum of one search square.
struct ReferenceSpectrum {
    rect: IntegerRect,
    /// Origin shift from the configured square to `rect`.
    grow: IntegerPoint,
    cutoff: u32,
    spectrum: Mutex<Option<Arc<FourierBuffer>>>,
    ready: AtomicBool,
    computations: AtomicUsize,
}

impl ReferenceSpectrum {
    fn new(rect: IntegerRect, grow: IntegerPoint, cutoff: u32) -> Self {
        Self {
            rect,
            grow,
            cutoff,
            spectrum: Mutex::new(None),
            ready: AtomicBool::new(false),
            computations: AtomicUsize::new(0),
        }
    }

    /// The spectrum, computed by the first caller while later callers wait
    /// on the lock.
    fn get_or_compute<F>(&self, compute: F) -> Result<Arc<FourierBuffer>>
    where
        F: FnOnce(IntegerRect, u32) -> Result<FourierBuffer>,
    {
        let mut slot = self.spectrum.lock();
        if let Some(spectrum) = slot.as_ref() {
            return Ok(Arc::clone(spectrum));
        }
        self.computations.fetch_add(1, Ordering::SeqCst);
        let spectrum = Arc::new(compute(self.rect, self.cutoff)?);
        *slot = Some(Arc::clone(&spectrum));
        self.ready.store(true, Ordering::Release);
        Ok(spectrum)
    }
}

/// Outcome of registering one item.
#[derive(Clone, Debug, PartialEq)]
pub enum AlignOutcome {
    Aligned(AlignmentResult),
    /// No square produced an acceptable peak.
    Failed(String),
    /// The item could not produce a sample.
    Unreadable,
}

/// Registers items against the reference item of an [`AlignmentParams`].
pub struct Aligner {
    params: AlignmentParams,
    reference: Arc<dyn ProcessableItem>,
    spectra: Vec<ReferenceSpectrum>,
}

impl Aligner {
    /// Validate the configuration against `list`.
    ///
    /// Fails when the reference is missing or unreadable, or when a search
    /// square does not fit in the reference image. Squares are grown to
    /// FFT-friendly sides around their center when the grown square still
    /// fits.
    pub fn new(params: AlignmentParams, list: &ImageList) -> Result<Self> {
        if list.is_empty() {
            return Err(SiderealError::EmptySequence);
        }
        if params.squares.is_empty() {
            return Err(SiderealError::Config("no search square defined".into()));
        }
        let name = params
            .reference
            .as_deref()
            .ok_or(SiderealError::MissingReference)?;
        let reference = list
            .find(name)
            .cloned()
            .ok_or(SiderealError::MissingReference)?;
        let image = reference
            .image()
            .ok_or_else(|| SiderealError::ReferenceUnavailable(name.to_string()))?;

        let mut spectra = Vec::with_capacity(params.squares.len());
        for (i, square) in params.squares.iter().enumerate() {
            let base = params.square_rect(i, name);
            if base.is_empty() || !base.fits_in(image.width(), image.height()) {
                return Err(SiderealError::Config(format!(
                    "search square '{}' does not fit in the reference image",
                    square.name
                )));
            }
            let adjusted = adjust_fft_rect(base);
            let rect = if adjusted.fits_in(image.width(), image.height()) {
                adjusted
            } else {
                base
            };
            let grow = IntegerPoint::new(
                rect.origin.x - base.origin.x,
                rect.origin.y - base.origin.y,
            );
            spectra.push(ReferenceSpectrum::new(rect, grow, params.discrete_cutoff(&rect)));
        }

        Ok(Self {
            params,
            reference,
            spectra,
        })
    }

    pub fn params(&self) -> &AlignmentParams {
        &self.params
    }

    pub fn reference(&self) -> &Arc<dyn ProcessableItem> {
        &self.reference
    }

    /// Sampled rectangle of square `index` for the item called `item`.
    pub fn sample_rect(&self, index: usize, item: &str) -> IntegerRect {
        let base = self.params.square_rect(index, item);
        let spectrum = &self.spectra[index];
        IntegerRect {
            origin: IntegerPoint::new(
                base.origin.x + spectrum.grow.x,
                base.origin.y + spectrum.grow.y,
            ),
            size: spectrum.rect.size,
        }
    }

    fn is_reference(&self, item: &dyn ProcessableItem) -> bool {
        std::ptr::eq(
            item as *const _ as *const (),
            Arc::as_ptr(&self.reference) as *const (),
        )
    }

    /// Whether the reference spectrum of square `index` is available.
    pub fn is_ready(&self, index: usize) -> bool {
        self.spectra[index].ready.load(Ordering::Acquire)
    }

    /// How many times the reference spectrum of square `index` was computed.
    pub fn spectrum_computations(&self, index: usize) -> usize {
        self.spectra[index].computations.load(Ordering::SeqCst)
    }

    /// Filtered reference spectrum of square `index`.
    pub fn reference_spectrum(&self, index: usize) -> Result<Arc<FourierBuffer>> {
        self.spectra[index].get_or_compute(|rect, cutoff| {
            let name = self.reference.name();
            let mut spectrum = self
                .reference
                .fourier_transform(rect, false)?
                .ok_or_else(|| SiderealError::ReferenceUnavailable(name.to_string()))?;
            spectrum.apply_cutoff(cutoff);

            if self.params.check_alignment {
                let usable = correlate(&spectrum, &spectrum)?.is_some_and(|fit| {
                    fit.passes(self.params.precision_threshold, self.params.value_threshold)
                });
                if !usable {
                    return Err(SiderealError::ReferenceUnavailable(format!(
                        "{}: square '{}' has no usable correlation peak",
                        name, self.params.squares[index].name
                    )));
                }
            }
            debug!(square = index, cutoff, "reference spectrum ready");
            Ok(spectrum)
        })
    }

    /// Register one item. Errors are fatal to the run; alignment failures
    /// are reported in the outcome.
    pub fn align(&self, item: &dyn ProcessableItem) -> Result<AlignOutcome> {
        let squares = self.spectra.len();
        if self.is_reference(item) {
            for i in 0..squares {
                self.reference_spectrum(i)?;
            }
            return Ok(AlignOutcome::Aligned(AlignmentResult::identity(squares)));
        }

        let Some(image) = item.image() else {
            return Ok(AlignOutcome::Unreadable);
        };
        let mut offsets = Vec::with_capacity(squares);
        let mut matches = Vec::with_capacity(squares);
        let mut worst_precision: f64 = 0.0;
        let mut rejections = Vec::new();

        for (i, spectrum) in self.spectra.iter().enumerate() {
            let reference = self.reference_spectrum(i)?;
            let square = &self.params.squares[i].name;
            let rect = self.sample_rect(i, item.name());
            if !rect.fits_in(image.width(), image.height()) {
                rejections.push(format!("{}: outside the image", square));
                offsets.push(None);
                continue;
            }

            let Some(mut candidate) = item.fourier_transform(rect, true)? else {
                return Ok(AlignOutcome::Unreadable);
            };
            candidate.apply_cutoff(spectrum.cutoff);

            let fit = match correlate(&candidate, &reference)? {
                Some(fit) => fit,
                None => {
                    rejections.push(format!("{}: no signal", square));
                    offsets.push(None);
                    continue;
                }
            };
            if self.params.check_alignment
                && !fit.passes(self.params.precision_threshold, self.params.value_threshold)
            {
                rejections.push(format!(
                    "{}: peak {:.3}, precision {:.2} px",
                    square, fit.value, fit.precision
                ));
                offsets.push(None);
                continue;
            }

            let d = Point::new(
                fit.dx + (rect.origin.x - spectrum.rect.origin.x) as f64,
                fit.dy + (rect.origin.y - spectrum.rect.origin.y) as f64,
            );
            let center = spectrum.rect.center();
            matches.push(SquareMatch {
                reference: center,
                candidate: Point::new(center.x + d.x, center.y + d.y),
            });
            offsets.push(Some(d));
            worst_precision = worst_precision.max(fit.precision);
            debug!(item = item.name(), square = %square, dx = d.x, dy = d.y, value = fit.value, "square matched");
        }

        let Some(transform) = solve_transform(
            &matches,
            self.params.compute_scale,
            self.params.compute_rotation,
        ) else {
            return Ok(AlignOutcome::Failed(format!(
                "no search square matched ({})",
                rejections.join("; ")
            )));
        };

        Ok(AlignOutcome::Aligned(AlignmentResult {
            transform,
            offsets,
            squares_used: matches.len(),
            worst_precision,
        }))
    }
}
