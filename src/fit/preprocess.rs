//! Spectrum validation, trimming and log conversion.
//!
//! Everything downstream works on a [`PreparedSpectrum`]: the samples inside the
//! requested range, with power converted to log10.

use crate::domain::{AperiodicMode, FitConfig, Spectrum};
use crate::error::FitError;

/// Points required beyond one peak plus the aperiodic parameters.
const MIN_POINT_BUFFER: usize = 2;

/// Minimum number of samples needed to fit the aperiodic curve and one peak.
pub fn min_points(mode: AperiodicMode) -> usize {
    mode.n_params() + 3 + MIN_POINT_BUFFER
}

/// Keep samples with `f_low <= f <= f_high`.
///
/// Both bounds are inclusive and compared exactly; no rounding is applied.
pub fn trim(freqs: &[f64], powers: &[f64], range: (f64, f64)) -> (Vec<f64>, Vec<f64>) {
    let (lo, hi) = range;
    freqs
        .iter()
        .zip(powers.iter())
        .filter(|(f, _)| **f >= lo && **f <= hi)
        .map(|(&f, &p)| (f, p))
        .unzip()
}

/// Spectrum trimmed to the analysis range, power in log10.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSpectrum {
    pub freqs: Vec<f64>,
    pub log_power: Vec<f64>,
    /// First and last fitted frequency.
    pub freq_range: (f64, f64),
    /// Mean sample spacing (Hz).
    pub freq_res: f64,
}

/// Trim `spectrum` to `config.freq_range`, check it is fit-able and convert to log10.
pub fn prepare(spectrum: &Spectrum, config: &FitConfig) -> Result<PreparedSpectrum, FitError> {
    let (freqs, powers) = match config.freq_range {
        Some(range) => trim(spectrum.freqs(), spectrum.powers(), range),
        None => (spectrum.freqs().to_vec(), spectrum.powers().to_vec()),
    };

    let needed = min_points(config.aperiodic_mode);
    if freqs.len() < needed {
        return Err(FitError::Range(format!(
            "{} points in range, at least {needed} required",
            freqs.len()
        )));
    }
    if freqs[0] <= 0.0 {
        return Err(FitError::Range(
            "frequency range includes 0 Hz, where the aperiodic curve is undefined".to_string(),
        ));
    }
    if let Some((f, p)) = freqs.iter().zip(powers.iter()).find(|(_, p)| **p <= 0.0) {
        return Err(FitError::Range(format!(
            "non-positive power {p} at {f} Hz"
        )));
    }

    let n = freqs.len();
    let freq_range = (freqs[0], freqs[n - 1]);
    let freq_res = (freq_range.1 - freq_range.0) / (n - 1) as f64;
    let log_power = powers.iter().map(|p| p.log10()).collect();

    Ok(PreparedSpectrum {
        freqs,
        log_power,
        freq_range,
        freq_res,
    })
}
