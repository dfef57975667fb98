//! Single-spectrum fit: the full pipeline from raw spectrum to [`FitResult`].
//!
//! Stages:
//!
//! 1. validate settings, trim to the analysis range, convert to log10
//! 2. robust aperiodic fit
//! 3. flatten and extract peaks
//! 4. drop edge and overlapping peaks
//! 5. aperiodic refit on the peak-removed spectrum + joint refit
//! 6. evaluate the final model
//!
//! The reported curves and statistics are always rebuilt from the final
//! parameters, so `model = aperiodic + Σ peaks` holds exactly.

use tracing::debug;

use crate::domain::{FitConfig, FitResult, FitWarning, Spectrum, peaks_curve};
use crate::error::FitError;
use crate::fit::aperiodic::fit_aperiodic_robust;
use crate::fit::combine::combine;
use crate::fit::evaluate::evaluate;
use crate::fit::flatten::flatten_with;
use crate::fit::peaks::{PeakSearchConfig, drop_edge_peaks, drop_overlapping_peaks, extract_peaks};
use crate::fit::preprocess::prepare;

/// A fit together with the curves it describes, on the fitted frequencies.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedSpectrum {
    pub result: FitResult,
    pub freqs: Vec<f64>,
    /// Data (log10 power) inside the fitted range.
    pub log_power: Vec<f64>,
    pub aperiodic_fit: Vec<f64>,
    /// Sum of all peak Gaussians.
    pub peak_fit: Vec<f64>,
    /// `aperiodic_fit + peak_fit`
    pub model_fit: Vec<f64>,
}

/// Fit one spectrum.
pub fn fit(spectrum: &Spectrum, config: &FitConfig) -> Result<FitResult, FitError> {
    fit_with_curves(spectrum, config).map(|f| f.result)
}

/// Fit one spectrum and keep the model curves.
pub fn fit_with_curves(spectrum: &Spectrum, config: &FitConfig) -> Result<FittedSpectrum, FitError> {
    fit_stages(spectrum, config, config.max_iterations)
}

/// The pipeline with the joint refit budget broken out of `config`.
fn fit_stages(
    spectrum: &Spectrum,
    config: &FitConfig,
    joint_iterations: usize,
) -> Result<FittedSpectrum, FitError> {
    config.validate()?;
    let prepared = prepare(spectrum, config)?;
    let freqs = prepared.freqs;
    let log_power = prepared.log_power;

    let mut warnings = Vec::new();
    let min_bw = config.peak_width_limits.0;
    if prepared.freq_res >= min_bw {
        debug!(freq_res = prepared.freq_res, min_bw, "resolution near lower width limit");
        warnings.push(FitWarning::ResolutionNearWidthLimit {
            freq_res: prepared.freq_res,
            min_bandwidth: min_bw,
        });
    }

    let robust = fit_aperiodic_robust(
        &freqs,
        &log_power,
        config.aperiodic_mode,
        config.aperiodic_percentile,
        config.max_iterations,
    )?;
    debug!(
        offset = robust.params.offset,
        exponent = robust.params.exponent,
        knee = ?robust.params.knee,
        "robust aperiodic fit"
    );

    let flattened = flatten_with(&freqs, &log_power, &robust.params);
    let search = PeakSearchConfig::from_fit_config(config, prepared.freq_res);
    let extraction = extract_peaks(&freqs, &flattened, &search);

    let peaks = drop_edge_peaks(extraction.peaks, prepared.freq_range, config.peak_edge_std);
    let peaks = drop_overlapping_peaks(peaks, config.peak_overlap_std);

    let combined = combine(
        &freqs,
        &log_power,
        &robust.params,
        &peaks,
        config.peak_width_limits,
        config.max_iterations,
        joint_iterations,
    )?;
    if let Some(reason) = combined.partial {
        warnings.push(FitWarning::PartialFit { reason });
    }

    let aperiodic_fit = combined.aperiodic.curve(&freqs);
    let peak_fit = peaks_curve(&combined.peaks, &freqs);
    let model_fit: Vec<f64> = aperiodic_fit
        .iter()
        .zip(peak_fit.iter())
        .map(|(a, p)| a + p)
        .collect();
    let quality = evaluate(&log_power, &model_fit);

    let result = FitResult {
        aperiodic: combined.aperiodic,
        peaks: combined.peaks,
        r_squared: quality.r_squared,
        fit_error: quality.fit_error,
        freq_res: prepared.freq_res,
        freq_range: prepared.freq_range,
        warnings,
    };

    Ok(FittedSpectrum {
        result,
        freqs,
        log_power,
        aperiodic_fit,
        peak_fit,
        model_fit,
    })
}
