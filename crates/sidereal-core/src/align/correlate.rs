use ndarray::Array2;

use crate::error::Result;
use crate::fourier::FourierBuffer;

/// Correlation peak of a candidate tile against the reference tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeakFit {
    /// Displacement of the candidate content, in pixels.
    pub dx: f64,
    pub dy: f64,
    /// Normalized peak height, 1.0 for identical tiles.
    pub value: f64,
    /// Peak standard deviation in pixels (worst axis); infinite when the
    /// surface is not peaked.
    pub precision: f64,
}

impl PeakFit {
    pub fn passes(&self, precision_threshold: f64, value_threshold: f64) -> bool {
        self.precision <= precision_threshold && self.value >= value_threshold
    }
}

/// Energy below which a filtered tile is considered featureless.
const MIN_ENERGY: f64 = 1e-12;

/// Cross-correlate two filtered spectra and fit the peak.
///
/// The surface is normalized by the tile energies so the peak lies in
/// `[-1, 1]`. Two featureless tiles match trivially at the origin. Returns
/// `None` when only one of them carries signal after filtering.
pub fn correlate(
    candidate: &FourierBuffer,
    reference: &FourierBuffer,
) -> Result<Option<PeakFit>> {
    let (a, b) = (candidate.energy(0), reference.energy(0));
    if !a.is_finite() || !b.is_finite() {
        return Ok(None);
    }
    match (a < MIN_ENERGY, b < MIN_ENERGY) {
        (true, true) => {
            return Ok(Some(PeakFit {
                dx: 0.0,
                dy: 0.0,
                value: 1.0,
                precision: 0.0,
            }))
        }
        (false, false) => {}
        _ => return Ok(None),
    }
    let norm = (a * b).sqrt();
    let mut surface = candidate.correlate(reference, 0)?;
    surface.mapv_inplace(|v| v / norm);
    Ok(Some(locate_peak(&surface)))
}

/// Discrete maximum of a circular correlation surface, refined to sub-pixel.
pub(crate) fn locate_peak(surface: &Array2<f64>) -> PeakFit {
    let (h, w) = surface.dim();
    let (mut peak_row, mut peak_col, mut peak) = (0, 0, f64::NEG_INFINITY);
    for ((row, col), &v) in surface.indexed_iter() {
        if v > peak {
            peak = v;
            peak_row = row;
            peak_col = col;
        }
    }

    // Wrap-around: indices past the middle are negative displacements.
    let dy = if peak_row > h / 2 {
        peak_row as f64 - h as f64
    } else {
        peak_row as f64
    };
    let dx = if peak_col > w / 2 {
        peak_col as f64 - w as f64
    } else {
        peak_col as f64
    };

    let column = |r: isize| surface[[wrap(peak_row as isize + r, h), peak_col]];
    let row = |c: isize| surface[[peak_row, wrap(peak_col as isize + c, w)]];
    let (sub_dy, sigma_y) = fit_parabola(column(-1), peak, column(1), h);
    let (sub_dx, sigma_x) = fit_parabola(row(-1), peak, row(1), w);

    PeakFit {
        dx: dx + sub_dx,
        dy: dy + sub_dy,
        value: peak,
        precision: sigma_x.max(sigma_y),
    }
}

#[inline]
fn wrap(i: isize, n: usize) -> usize {
    i.rem_euclid(n as isize) as usize
}

/// Parabola through three samples around a maximum.
///
/// Returns the vertex offset, clamped to half a pixel, and the width of a
/// Gaussian with the same curvature. An axis of length 1 or 2 gives no
/// usable neighbourhood and is reported as perfectly sharp.
fn fit_parabola(y_prev: f64, y_curr: f64, y_next: f64, len: usize) -> (f64, f64) {
    if len < 3 {
        return (0.0, 0.0);
    }
    let curvature = y_prev - 2.0 * y_curr + y_next;
    if curvature >= -1e-12 || y_curr <= 0.0 {
        return (0.0, f64::INFINITY);
    }
    let delta = ((y_prev - y_next) / (2.0 * curvature)).clamp(-0.5, 0.5);
    // y ~ y0 (1 - d^2 / (2 s^2)), and the fitted second-order coefficient is
    // curvature / 2.
    let sigma = (-y_curr / curvature).sqrt();
    (delta, sigma)
}
