//! Iterative peak extraction from a flattened spectrum.
//!
//! The search is a small state machine driven by [`extract_peaks`]:
//!
//! ```text
//! SEARCHING ──candidate──▶ CANDIDATE_FOUND ──local fit──▶ FITTED ──▶ SEARCHING
//!     │
//!     └──stop condition──▶ STOPPED
//! ```
//!
//! Responsibilities:
//!
//! - pick the highest unmasked residual sample as the next candidate
//! - stop on the absolute height floor, the relative noise threshold, the peak
//!   cap, or when nothing is left to examine
//! - fit one Gaussian to a local window around each candidate
//! - accept (subtract from the residual) or discard (mask the region)
//!
//! Post-filters [`drop_edge_peaks`] and [`drop_overlapping_peaks`] run on the
//! extractor's output before the joint refit.

use tracing::debug;

use crate::domain::{FitConfig, PeakParams};
use crate::math::{
    Bounds, FWHM_PER_STD, LmOptions, argmax_unmasked, fit_curve, gaussian, std_dev,
};
use crate::models::GaussianModel;

/// Residual heights at or below this are numerical noise, whatever the
/// configured minimum height.
pub const NOISE_FLOOR: f64 = 1e-6;

/// Local fit window half-width, in guessed bandwidths.
const WINDOW_STDS: f64 = 3.0;
/// Minimum samples on each side of the candidate in the local window.
const MIN_WINDOW_SIDE: usize = 3;
/// Lower bound on the fitted bandwidth, in units of frequency resolution.
const MIN_STD_PER_RES: f64 = 1e-3;

/// Immutable settings for one extraction run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakSearchConfig {
    /// `(min_bw, max_bw)` accepted bandwidth range (Gaussian std, Hz).
    pub width_limits: (f64, f64),
    pub max_n_peaks: Option<usize>,
    pub min_peak_height: f64,
    /// Relative threshold in residual standard deviations.
    pub peak_threshold: f64,
    /// Sample spacing (Hz).
    pub freq_res: f64,
    pub max_iterations: usize,
}

impl PeakSearchConfig {
    pub fn from_fit_config(config: &FitConfig, freq_res: f64) -> Self {
        Self {
            width_limits: config.peak_width_limits,
            max_n_peaks: config.max_n_peaks,
            min_peak_height: config.min_peak_height,
            peak_threshold: config.peak_threshold,
            freq_res,
            max_iterations: config.max_iterations,
        }
    }
}

/// Highest remaining residual sample and its initial Gaussian guess.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub index: usize,
    pub center_freq: f64,
    pub height: f64,
    pub guess_std: f64,
}

/// Why the search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Highest remaining residual is at or below `min_peak_height`.
    BelowMinHeight,
    /// Highest remaining residual is within `peak_threshold` standard deviations.
    BelowNoiseThreshold,
    /// `max_n_peaks` peaks were accepted.
    MaxPeaks,
    /// Every sample is masked or has already been examined.
    Exhausted,
}

enum SearchState {
    Searching,
    CandidateFound(Candidate),
    Fitted(Candidate, Option<PeakParams>),
    Stopped(StopReason),
}

/// Mutable state of one extraction run.
struct PeakAccumulator {
    residual: Vec<f64>,
    masked: Vec<bool>,
    peaks: Vec<PeakParams>,
    n_discarded: usize,
    n_examined: usize,
}

/// Output of [`extract_peaks`].
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Accepted peaks in detection order.
    pub peaks: Vec<PeakParams>,
    /// Flattened spectrum with every accepted peak subtracted.
    pub residual: Vec<f64>,
    pub stop: StopReason,
    pub n_discarded: usize,
}

/// Extract Gaussian peaks from `flattened` (log power minus aperiodic fit).
pub fn extract_peaks(freqs: &[f64], flattened: &[f64], cfg: &PeakSearchConfig) -> Extraction {
    let n = freqs.len().min(flattened.len());
    let mut acc = PeakAccumulator {
        residual: flattened[..n].to_vec(),
        masked: vec![false; n],
        peaks: Vec::new(),
        n_discarded: 0,
        n_examined: 0,
    };

    let mut state = SearchState::Searching;
    let stop = loop {
        state = match state {
            SearchState::Searching => search(freqs, &acc, cfg),
            SearchState::CandidateFound(candidate) => {
                acc.n_examined += 1;
                let fitted = fit_candidate(freqs, &acc.residual, &candidate, cfg);
                SearchState::Fitted(candidate, fitted)
            }
            SearchState::Fitted(candidate, fitted) => {
                match fitted.filter(|p| accepts(p, cfg)) {
                    Some(peak) => {
                        debug!(
                            center_freq = peak.center_freq,
                            amplitude = peak.amplitude,
                            bandwidth = peak.bandwidth,
                            "peak accepted"
                        );
                        for (r, &f) in acc.residual.iter_mut().zip(freqs.iter()) {
                            *r -= peak.eval(f);
                        }
                        acc.peaks.push(peak);
                    }
                    None => {
                        debug!(
                            center_freq = candidate.center_freq,
                            height = candidate.height,
                            "candidate discarded"
                        );
                        mask_around(freqs, &mut acc.masked, &candidate);
                        acc.n_discarded += 1;
                    }
                }
                SearchState::Searching
            }
            SearchState::Stopped(reason) => break reason,
        };
    };

    debug!(
        n_peaks = acc.peaks.len(),
        n_discarded = acc.n_discarded,
        stop = ?stop,
        "peak search finished"
    );

    Extraction {
        peaks: acc.peaks,
        residual: acc.residual,
        stop,
        n_discarded: acc.n_discarded,
    }
}

fn search(freqs: &[f64], acc: &PeakAccumulator, cfg: &PeakSearchConfig) -> SearchState {
    if cfg.max_n_peaks.is_some_and(|max| acc.peaks.len() >= max) {
        return SearchState::Stopped(StopReason::MaxPeaks);
    }
    if acc.n_examined >= acc.residual.len() {
        return SearchState::Stopped(StopReason::Exhausted);
    }
    let Some(index) = argmax_unmasked(&acc.residual, &acc.masked) else {
        return SearchState::Stopped(StopReason::Exhausted);
    };

    let height = acc.residual[index];
    if height <= cfg.min_peak_height.max(NOISE_FLOOR) {
        return SearchState::Stopped(StopReason::BelowMinHeight);
    }
    if height <= cfg.peak_threshold * std_dev(&acc.residual) {
        return SearchState::Stopped(StopReason::BelowNoiseThreshold);
    }

    SearchState::CandidateFound(Candidate {
        index,
        center_freq: freqs[index],
        height,
        guess_std: guess_bandwidth(&acc.residual, index, cfg),
    })
}

/// Bandwidth guess from the half-maximum width around `index`.
///
/// Uses the shorter of the two half-max distances; falls back to the upper
/// width limit when the residual never drops to half height on either side.
pub fn guess_bandwidth(residual: &[f64], index: usize, cfg: &PeakSearchConfig) -> f64 {
    let half = 0.5 * residual[index];
    let left = (0..index)
        .rev()
        .find(|&i| residual[i] <= half)
        .map(|i| index - i);
    let right = (index + 1..residual.len())
        .find(|&i| residual[i] <= half)
        .map(|i| i - index);

    let (min_bw, max_bw) = cfg.width_limits;
    let guess = match (left, right) {
        (Some(l), Some(r)) => 2.0 * l.min(r) as f64 * cfg.freq_res / FWHM_PER_STD,
        (Some(side), None) | (None, Some(side)) => 2.0 * side as f64 * cfg.freq_res / FWHM_PER_STD,
        (None, None) => max_bw,
    };
    guess.clamp(min_bw, max_bw)
}

/// Fit one Gaussian to the residual in a window around the candidate.
///
/// `None` when the solver fails.
fn fit_candidate(
    freqs: &[f64],
    residual: &[f64],
    candidate: &Candidate,
    cfg: &PeakSearchConfig,
) -> Option<PeakParams> {
    let (lo, hi) = local_window(freqs, candidate);
    let x = &freqs[lo..hi];
    let y = &residual[lo..hi];

    let reach = WINDOW_STDS * candidate.guess_std;
    let bounds = Bounds {
        lower: vec![
            candidate.center_freq - reach,
            0.0,
            MIN_STD_PER_RES * cfg.freq_res,
        ],
        upper: vec![candidate.center_freq + reach, f64::INFINITY, f64::INFINITY],
    };
    let p0 = [candidate.center_freq, candidate.height, candidate.guess_std];

    match fit_curve(
        &GaussianModel { n_peaks: 1 },
        x,
        y,
        &p0,
        &bounds,
        &LmOptions::with_max_iterations(cfg.max_iterations),
    ) {
        Ok(sol) => Some(PeakParams::from_array([
            sol.params[0],
            sol.params[1],
            sol.params[2],
        ])),
        Err(e) => {
            debug!(center_freq = candidate.center_freq, error = %e, "local peak fit failed");
            None
        }
    }
}

/// Index range `[lo, hi)` of the local fit window.
fn local_window(freqs: &[f64], candidate: &Candidate) -> (usize, usize) {
    let reach = WINDOW_STDS * candidate.guess_std;
    let n = freqs.len();
    let idx = candidate.index;

    let mut lo = freqs.partition_point(|&f| f < candidate.center_freq - reach);
    let mut hi = freqs.partition_point(|&f| f <= candidate.center_freq + reach);
    lo = lo.min(idx.saturating_sub(MIN_WINDOW_SIDE));
    hi = hi.max((idx + MIN_WINDOW_SIDE + 1).min(n));
    (lo, hi)
}

fn accepts(peak: &PeakParams, cfg: &PeakSearchConfig) -> bool {
    let (min_bw, max_bw) = cfg.width_limits;
    peak.amplitude > 0.0 && peak.bandwidth >= min_bw && peak.bandwidth <= max_bw
}

fn mask_around(freqs: &[f64], masked: &mut [bool], candidate: &Candidate) {
    for (m, &f) in masked.iter_mut().zip(freqs.iter()) {
        if (f - candidate.center_freq).abs() <= candidate.guess_std {
            *m = true;
        }
    }
    masked[candidate.index] = true;
}

/// Drop peaks whose center lies within `edge_std` bandwidths of either end of
/// `freq_range`.
pub fn drop_edge_peaks(
    peaks: Vec<PeakParams>,
    freq_range: (f64, f64),
    edge_std: f64,
) -> Vec<PeakParams> {
    let (lo, hi) = freq_range;
    peaks
        .into_iter()
        .filter(|p| {
            let reach = edge_std * p.bandwidth;
            let keep = (p.center_freq - lo).abs() > reach && (hi - p.center_freq).abs() > reach;
            if !keep {
                debug!(center_freq = p.center_freq, "peak dropped at range edge");
            }
            keep
        })
        .collect()
}

/// For frequency-adjacent peaks whose `center ± overlap_std·bandwidth`
/// intervals overlap, drop the lower-amplitude one.
///
/// Survivors keep their input (detection) order.
pub fn drop_overlapping_peaks(peaks: Vec<PeakParams>, overlap_std: f64) -> Vec<PeakParams> {
    let mut by_freq: Vec<usize> = (0..peaks.len()).collect();
    by_freq.sort_by(|&a, &b| peaks[a].center_freq.total_cmp(&peaks[b].center_freq));

    let mut dropped = vec![false; peaks.len()];
    for pair in by_freq.windows(2) {
        let (a, b) = (&peaks[pair[0]], &peaks[pair[1]]);
        let a_hi = a.center_freq + overlap_std * a.bandwidth;
        let b_lo = b.center_freq - overlap_std * b.bandwidth;
        if a_hi > b_lo {
            let loser = if a.amplitude < b.amplitude { pair[0] } else { pair[1] };
            debug!(center_freq = peaks[loser].center_freq, "overlapping peak dropped");
            dropped[loser] = true;
        }
    }

    peaks
        .into_iter()
        .zip(dropped)
        .filter_map(|(p, d)| (!d).then_some(p))
        .collect()
}

/// Residual left after subtracting `peaks` from `flattened`.
pub fn subtract_peaks(freqs: &[f64], flattened: &[f64], peaks: &[PeakParams]) -> Vec<f64> {
    freqs
        .iter()
        .zip(flattened.iter())
        .map(|(&f, &y)| {
            y - peaks
                .iter()
                .map(|p| gaussian(f, p.center_freq, p.amplitude, p.bandwidth))
                .sum::<f64>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Vec<f64> {
        (0..=74).map(|i| 3.0 + 0.5 * f64::from(i)).collect()
    }

    fn cfg() -> PeakSearchConfig {
        PeakSearchConfig {
            width_limits: (0.5, 12.0),
            max_n_peaks: None,
            min_peak_height: 0.05,
            peak_threshold: 2.0,
            freq_res: 0.5,
            max_iterations: 500,
        }
    }

    fn bumps(freqs: &[f64], peaks: &[PeakParams]) -> Vec<f64> {
        freqs
            .iter()
            .map(|&f| peaks.iter().map(|p| p.eval(f)).sum())
            .collect()
    }

    #[test]
    fn finds_two_separated_peaks_tallest_first() {
        let f = grid();
        let truth = [
            PeakParams { center_freq: 10.0, amplitude: 0.5, bandwidth: 1.0 },
            PeakParams { center_freq: 22.0, amplitude: 0.3, bandwidth: 2.0 },
        ];
        let out = extract_peaks(&f, &bumps(&f, &truth), &cfg());

        assert_eq!(out.peaks.len(), 2);
        for (got, want) in out.peaks.iter().zip(truth.iter()) {
            assert!((got.center_freq - want.center_freq).abs() < 1e-3, "{got:?}");
            assert!((got.amplitude - want.amplitude).abs() < 1e-3, "{got:?}");
            assert!((got.bandwidth - want.bandwidth).abs() < 1e-3, "{got:?}");
        }
        assert!(out.residual.iter().all(|r| r.abs() < 1e-3));
    }

    #[test]
    fn flat_residual_stops_immediately() {
        let f = grid();
        let out = extract_peaks(&f, &vec![0.0; f.len()], &cfg());
        assert!(out.peaks.is_empty());
        assert_eq!(out.stop, StopReason::BelowMinHeight);
    }

    #[test]
    fn peak_cap_is_honored() {
        let f = grid();
        let truth = [
            PeakParams { center_freq: 10.0, amplitude: 0.5, bandwidth: 1.0 },
            PeakParams { center_freq: 22.0, amplitude: 0.3, bandwidth: 2.0 },
        ];
        let config = PeakSearchConfig { max_n_peaks: Some(1), ..cfg() };
        let out = extract_peaks(&f, &bumps(&f, &truth), &config);
        assert_eq!(out.peaks.len(), 1);
        assert_eq!(out.stop, StopReason::MaxPeaks);
        assert!((out.peaks[0].center_freq - 10.0).abs() < 1e-3);
    }

    #[test]
    fn too_narrow_peak_is_discarded() {
        let f = grid();
        let truth = [PeakParams { center_freq: 20.0, amplitude: 0.6, bandwidth: 1.0 }];
        let config = PeakSearchConfig { width_limits: (2.0, 12.0), ..cfg() };
        let out = extract_peaks(&f, &bumps(&f, &truth), &config);
        assert!(out.peaks.is_empty());
        assert!(out.n_discarded >= 1);
    }

    #[test]
    fn bandwidth_guess_uses_shorter_half_max_side() {
        let residual = [0.0, 0.2, 0.6, 1.0, 0.8, 0.7, 0.4, 0.0];
        let config = PeakSearchConfig { width_limits: (0.01, 100.0), freq_res: 1.0, ..cfg() };
        // left side crosses at distance 2, right side at distance 3
        let guess = guess_bandwidth(&residual, 3, &config);
        assert!((guess - 4.0 / FWHM_PER_STD).abs() < 1e-12);
    }

    #[test]
    fn bandwidth_guess_without_crossing_uses_upper_limit() {
        let residual = [0.9, 1.0, 0.9];
        let config = PeakSearchConfig { width_limits: (0.5, 4.0), freq_res: 1.0, ..cfg() };
        assert_eq!(guess_bandwidth(&residual, 1, &config), 4.0);
    }

    #[test]
    fn edge_peaks_are_dropped() {
        let peaks = vec![
            PeakParams { center_freq: 3.5, amplitude: 0.4, bandwidth: 1.0 },
            PeakParams { center_freq: 15.0, amplitude: 0.4, bandwidth: 1.0 },
            PeakParams { center_freq: 39.5, amplitude: 0.4, bandwidth: 1.0 },
        ];
        let kept = drop_edge_peaks(peaks, (3.0, 40.0), 1.0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].center_freq, 15.0);
    }

    #[test]
    fn overlap_keeps_higher_amplitude_in_detection_order() {
        let peaks = vec![
            PeakParams { center_freq: 30.0, amplitude: 0.5, bandwidth: 1.0 },
            PeakParams { center_freq: 10.0, amplitude: 0.2, bandwidth: 2.0 },
            PeakParams { center_freq: 11.0, amplitude: 0.4, bandwidth: 2.0 },
        ];
        let kept = drop_overlapping_peaks(peaks, 0.75);
        let centers: Vec<f64> = kept.iter().map(|p| p.center_freq).collect();
        assert_eq!(centers, vec![30.0, 11.0]);
    }

    #[test]
    fn subtracting_all_peaks_flattens_bumps() {
        let f = grid();
        let truth = [PeakParams { center_freq: 12.0, amplitude: 0.4, bandwidth: 1.5 }];
        let residual = subtract_peaks(&f, &bumps(&f, &truth), &truth);
        assert!(residual.iter().all(|r| r.abs() < 1e-12));
    }
}
