//! Synthetic power spectra.
//!
//! Spectra are built in log10 space as aperiodic curve + Gaussian peaks +
//! optional white noise, then returned as linear power. A fixed seed makes
//! every draw reproducible.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{AperiodicParams, PeakParams, peaks_curve};
use crate::error::FitError;

/// Evenly spaced frequencies from `range.0` to `range.1` (inclusive) with step `res`.
pub fn gen_freqs(range: (f64, f64), res: f64) -> Result<Vec<f64>, FitError> {
    let (lo, hi) = range;
    if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
        return Err(FitError::InvalidConfig(format!(
            "invalid frequency range [{lo}, {hi}]"
        )));
    }
    if !(res.is_finite() && res > 0.0) {
        return Err(FitError::InvalidConfig(format!(
            "frequency resolution must be > 0, got {res}"
        )));
    }
    // Small slack so that `hi` survives float rounding in `(hi - lo) / res`.
    let n = ((hi - lo) / res + 1e-9).floor() as usize + 1;
    Ok((0..n).map(|i| lo + i as f64 * res).collect())
}

/// One synthetic spectrum: `(freqs, powers)` with powers in linear units.
///
/// `noise` is the standard deviation of white noise added in log10 space.
pub fn gen_power_spectrum(
    range: (f64, f64),
    aperiodic: &AperiodicParams,
    peaks: &[PeakParams],
    noise: f64,
    seed: u64,
    res: f64,
) -> Result<(Vec<f64>, Vec<f64>), FitError> {
    let freqs = gen_freqs(range, res)?;
    let powers = synth_powers(&freqs, aperiodic, peaks, noise, seed)?;
    Ok((freqs, powers))
}

/// `n_spectra` spectra sharing one frequency axis.
///
/// Spectrum `i` draws its noise from `seed + i`.
pub fn gen_group_power_spectra(
    n_spectra: usize,
    range: (f64, f64),
    aperiodic: &AperiodicParams,
    peaks: &[PeakParams],
    noise: f64,
    seed: u64,
    res: f64,
) -> Result<(Vec<f64>, Vec<Vec<f64>>), FitError> {
    let freqs = gen_freqs(range, res)?;
    let spectra = (0..n_spectra as u64)
        .map(|i| synth_powers(&freqs, aperiodic, peaks, noise, seed.wrapping_add(i)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((freqs, spectra))
}

fn synth_powers(
    freqs: &[f64],
    aperiodic: &AperiodicParams,
    peaks: &[PeakParams],
    noise: f64,
    seed: u64,
) -> Result<Vec<f64>, FitError> {
    if !(noise.is_finite() && noise >= 0.0) {
        return Err(FitError::InvalidConfig(format!("noise must be >= 0, got {noise}")));
    }

    let mut log_power: Vec<f64> = aperiodic
        .curve(freqs)
        .iter()
        .zip(peaks_curve(peaks, freqs))
        .map(|(a, p)| a + p)
        .collect();

    if noise > 0.0 {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, noise)
            .map_err(|e| FitError::InvalidConfig(format!("noise distribution error: {e}")))?;
        for v in &mut log_power {
            *v += normal.sample(&mut rng);
        }
    }

    Ok(log_power.into_iter().map(|v| 10f64.powf(v)).collect())
}
