//! Second/third-derivative level finder for continuous row signals.
//!
//! The signal is smoothed with a zero-phase low-pass, differentiated three
//! times, and the level is placed at the strongest third-derivative response
//! between the two strongest second-derivative peaks.

use crate::filter::{diff, FilterError, IirFilter};

/// Peaks of |d2| below this are treated as numerical noise of a flat signal.
const FLAT_SIGNAL_FLOOR: f64 = 1e-6;

/// Result of [`find_by_derivatives`]. Offsets index the input signal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DerivativeLevel {
    pub offset: usize,
    /// The two strongest |d2| peaks, as signal offsets, upper first.
    pub bracket: (usize, usize),
    /// |d3| at the level.
    pub strength: f64,
}

/// Indices of strict local maxima with `x[i] >= min_height`.
///
/// A flat-topped peak is reported once, at the middle of the plateau (left
/// middle for even plateau lengths). End points are never peaks.
pub fn find_peaks(x: &[f64], min_height: f64) -> Vec<usize> {
    let mut peaks = Vec::new();
    let n = x.len();
    let mut i = 1;
    while i + 1 < n {
        if x[i - 1] < x[i] {
            let mut ahead = i;
            while ahead + 1 < n && x[ahead + 1] == x[i] {
                ahead += 1;
            }
            if ahead + 1 < n && x[ahead + 1] < x[i] {
                let mid = (i + ahead) / 2;
                if x[mid] >= min_height {
                    peaks.push(mid);
                }
                i = ahead + 1;
                continue;
            }
        }
        i += 1;
    }
    peaks
}

/// Locate the most prominent change in `signal`.
///
/// Returns `Ok(None)` when the signal is too short, flat, or shows fewer than
/// two |d2| peaks of at least `minimum_evidence`.
pub fn find_by_derivatives(
    signal: &[f64],
    filter: &IirFilter,
    minimum_evidence: f64,
) -> Result<Option<DerivativeLevel>, FilterError> {
    if signal.len() < 4 {
        return Ok(None);
    }
    let smoothed = filter.filtfilt(signal)?;
    let d2 = diff(&diff(&smoothed));
    let d3 = diff(&d2);
    let d2_abs: Vec<f64> = d2.iter().map(|v| v.abs()).collect();

    let mut peaks = find_peaks(&d2_abs, minimum_evidence.max(FLAT_SIGNAL_FLOOR));
    log::trace!("d2 peaks at {peaks:?}");
    if peaks.len() < 2 {
        return Ok(None);
    }
    peaks.sort_by(|&a, &b| d2_abs[b].total_cmp(&d2_abs[a]).then(a.cmp(&b)));
    let (first, second) = (peaks[0] + 2, peaks[1] + 2);
    let (upper, lower) = (first.min(second), first.max(second));

    // d3[j] belongs to signal offset j + 3
    let best = d3
        .iter()
        .enumerate()
        .map(|(j, v)| (j + 3, v.abs()))
        .filter(|&(offset, v)| offset > upper && offset < lower && v > 0.0)
        .fold(None, |best: Option<(usize, f64)>, cand| match best {
            Some(b) if b.1 >= cand.1 => Some(b),
            _ => Some(cand),
        });

    Ok(best.map(|(offset, strength)| DerivativeLevel {
        offset,
        bracket: (upper, lower),
        strength,
    }))
}
