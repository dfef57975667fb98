//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for reporting or comparisons
//!
//! Units: frequencies are in Hz, power values handed to the fitter are linear,
//! and every fitted quantity (aperiodic curve, peak amplitudes, errors) is in
//! log10(power) units.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::FitError;
use crate::math::{aperiodic_fixed, aperiodic_knee, gaussian};

/// Version of the flat [`FitRecord`] schema.
pub const RECORD_SCHEMA_VERSION: u32 = 1;

/// A power spectrum: strictly increasing frequencies with one power value each.
///
/// Construction checks shape, ordering and finiteness. Positivity of power is
/// checked later, against the frequency range actually fitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    freqs: Vec<f64>,
    powers: Vec<f64>,
}

impl Spectrum {
    pub fn new(freqs: Vec<f64>, powers: Vec<f64>) -> Result<Self, FitError> {
        if freqs.len() != powers.len() {
            return Err(FitError::InvalidInput(format!(
                "frequency and power lengths differ ({} vs {})",
                freqs.len(),
                powers.len()
            )));
        }
        if freqs.is_empty() {
            return Err(FitError::InvalidInput("spectrum is empty".to_string()));
        }
        if freqs.iter().any(|f| !f.is_finite() || *f < 0.0) {
            return Err(FitError::InvalidInput(
                "frequencies must be finite and non-negative".to_string(),
            ));
        }
        if freqs.windows(2).any(|w| w[1] <= w[0]) {
            return Err(FitError::InvalidInput(
                "frequencies must be strictly increasing".to_string(),
            ));
        }
        if powers.iter().any(|p| !p.is_finite()) {
            return Err(FitError::InvalidInput("power values must be finite".to_string()));
        }
        Ok(Self { freqs, powers })
    }

    pub fn freqs(&self) -> &[f64] {
        &self.freqs
    }

    pub fn powers(&self) -> &[f64] {
        &self.powers
    }

    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }
}

/// Aperiodic model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AperiodicMode {
    /// `offset - log10(f^exponent)`.
    Fixed,
    /// `offset - log10(knee + f^exponent)`.
    Knee,
}

impl AperiodicMode {
    /// Number of free parameters in this mode.
    pub fn n_params(self) -> usize {
        match self {
            AperiodicMode::Fixed => 2,
            AperiodicMode::Knee => 3,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AperiodicMode::Fixed => "fixed",
            AperiodicMode::Knee => "knee",
        }
    }
}

/// Fitted aperiodic (background) parameters.
///
/// Parameter vectors used by the solver are laid out as
/// `[offset, exponent]` or `[offset, exponent, knee]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AperiodicParams {
    pub offset: f64,
    pub exponent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knee: Option<f64>,
}

impl AperiodicParams {
    pub fn mode(&self) -> AperiodicMode {
        if self.knee.is_some() {
            AperiodicMode::Knee
        } else {
            AperiodicMode::Fixed
        }
    }

    /// Background value (log10 power) at `freq`.
    pub fn eval(&self, freq: f64) -> f64 {
        match self.knee {
            Some(knee) => aperiodic_knee(freq, self.offset, self.exponent, knee),
            None => aperiodic_fixed(freq, self.offset, self.exponent),
        }
    }

    pub fn curve(&self, freqs: &[f64]) -> Vec<f64> {
        freqs.iter().map(|&f| self.eval(f)).collect()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        match self.knee {
            Some(knee) => vec![self.offset, self.exponent, knee],
            None => vec![self.offset, self.exponent],
        }
    }

    /// Rebuild from a solver parameter vector.
    ///
    /// # Panics
    /// Panics if `p` is shorter than `mode.n_params()`.
    pub fn from_slice(mode: AperiodicMode, p: &[f64]) -> Self {
        Self {
            offset: p[0],
            exponent: p[1],
            knee: match mode {
                AperiodicMode::Fixed => None,
                AperiodicMode::Knee => Some(p[2]),
            },
        }
    }
}

/// One Gaussian peak in log-power space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakParams {
    /// Center frequency (Hz).
    pub center_freq: f64,
    /// Height above the aperiodic background (log10 power).
    pub amplitude: f64,
    /// Gaussian standard deviation (Hz).
    pub bandwidth: f64,
}

impl PeakParams {
    pub fn eval(&self, freq: f64) -> f64 {
        gaussian(freq, self.center_freq, self.amplitude, self.bandwidth)
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.center_freq, self.amplitude, self.bandwidth]
    }

    pub fn from_array(p: [f64; 3]) -> Self {
        Self {
            center_freq: p[0],
            amplitude: p[1],
            bandwidth: p[2],
        }
    }
}

/// Sum of all peaks at every frequency.
pub fn peaks_curve(peaks: &[PeakParams], freqs: &[f64]) -> Vec<f64> {
    freqs
        .iter()
        .map(|&f| peaks.iter().map(|p| p.eval(f)).sum())
        .collect()
}

/// Settings for a single-spectrum fit.
///
/// Compared by structural equality (see [`crate::domain::settings_consistent`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Inclusive `[f_low, f_high]` trim applied before fitting. `None` fits everything.
    pub freq_range: Option<(f64, f64)>,
    /// `[min_bw, max_bw]` bounds on accepted peak bandwidth (Gaussian std, Hz).
    pub peak_width_limits: (f64, f64),
    /// Hard cap on extracted peaks. `None` is unlimited.
    pub max_n_peaks: Option<usize>,
    /// Absolute floor on residual height for a candidate peak (log10 power).
    pub min_peak_height: f64,
    /// Relative floor on residual height, in standard deviations of the residual.
    pub peak_threshold: f64,
    pub aperiodic_mode: AperiodicMode,
    /// Percentile (0–100) of the clipped initial residual used to select
    /// background-only points for the robust aperiodic refit.
    pub aperiodic_percentile: f64,
    /// Drop peaks whose center is within this many bandwidths of a range edge.
    pub peak_edge_std: f64,
    /// Overlap test half-width, in bandwidths, for adjacent peaks.
    pub peak_overlap_std: f64,
    /// Iteration budget for every least-squares solve.
    pub max_iterations: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            freq_range: None,
            peak_width_limits: (0.5, 12.0),
            max_n_peaks: None,
            min_peak_height: 0.0,
            peak_threshold: 2.0,
            aperiodic_mode: AperiodicMode::Fixed,
            aperiodic_percentile: 0.025,
            peak_edge_std: 1.0,
            peak_overlap_std: 0.75,
            max_iterations: 1000,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<(), FitError> {
        if let Some((lo, hi)) = self.freq_range {
            if !(lo.is_finite() && hi.is_finite()) || lo < 0.0 || lo > hi {
                return Err(FitError::InvalidConfig(format!(
                    "freq_range must satisfy 0 <= f_low <= f_high, got [{lo}, {hi}]"
                )));
            }
        }
        let (min_bw, max_bw) = self.peak_width_limits;
        if !(min_bw.is_finite() && max_bw.is_finite()) || min_bw <= 0.0 || min_bw > max_bw {
            return Err(FitError::InvalidConfig(format!(
                "peak_width_limits must satisfy 0 < min <= max, got [{min_bw}, {max_bw}]"
            )));
        }
        if !(self.min_peak_height.is_finite() && self.min_peak_height >= 0.0) {
            return Err(FitError::InvalidConfig("min_peak_height must be >= 0".to_string()));
        }
        if !(self.peak_threshold.is_finite() && self.peak_threshold >= 0.0) {
            return Err(FitError::InvalidConfig("peak_threshold must be >= 0".to_string()));
        }
        if !(0.0..=100.0).contains(&self.aperiodic_percentile) {
            return Err(FitError::InvalidConfig(
                "aperiodic_percentile must be within [0, 100]".to_string(),
            ));
        }
        if !(self.peak_edge_std.is_finite() && self.peak_edge_std >= 0.0) {
            return Err(FitError::InvalidConfig("peak_edge_std must be >= 0".to_string()));
        }
        if !(self.peak_overlap_std.is_finite() && self.peak_overlap_std >= 0.0) {
            return Err(FitError::InvalidConfig("peak_overlap_std must be >= 0".to_string()));
        }
        if self.max_iterations == 0 {
            return Err(FitError::InvalidConfig("max_iterations must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Non-fatal conditions attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FitWarning {
    /// The joint refit failed; parameters are the pre-refit estimates.
    PartialFit { reason: String },
    /// Frequency resolution is at or above the lower bandwidth limit, so narrow
    /// peaks may be overfit.
    ResolutionNearWidthLimit { freq_res: f64, min_bandwidth: f64 },
}

/// Frequency information about the data a result was fitted on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataInfo {
    pub freq_range: (f64, f64),
    pub freq_res: f64,
}

/// Output of one spectrum fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub aperiodic: AperiodicParams,
    /// Peaks in detection order. Empty is a valid outcome.
    pub peaks: Vec<PeakParams>,
    pub r_squared: f64,
    /// Mean absolute error between model and data (log10 power).
    pub fit_error: f64,
    pub freq_res: f64,
    /// First and last frequency actually fitted.
    pub freq_range: (f64, f64),
    #[serde(default)]
    pub warnings: Vec<FitWarning>,
}

impl FitResult {
    /// Full model (log10 power) at the given frequencies.
    pub fn model_log_power(&self, freqs: &[f64]) -> Vec<f64> {
        freqs
            .iter()
            .map(|&f| self.aperiodic.eval(f) + self.peaks.iter().map(|p| p.eval(f)).sum::<f64>())
            .collect()
    }

    pub fn has_peaks(&self) -> bool {
        !self.peaks.is_empty()
    }

    /// True when the joint refit was skipped and pre-refit estimates were kept.
    pub fn is_partial(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, FitWarning::PartialFit { .. }))
    }

    pub fn data_info(&self) -> DataInfo {
        DataInfo {
            freq_range: self.freq_range,
            freq_res: self.freq_res,
        }
    }

    pub fn to_record(&self) -> FitRecord {
        FitRecord {
            schema_version: RECORD_SCHEMA_VERSION,
            offset: self.aperiodic.offset,
            exponent: self.aperiodic.exponent,
            knee: self.aperiodic.knee,
            peaks: self.peaks.iter().map(PeakParams::to_array).collect(),
            r_squared: self.r_squared,
            fit_error: self.fit_error,
            freq_res: self.freq_res,
            freq_low: self.freq_range.0,
            freq_high: self.freq_range.1,
            partial_fit: self.is_partial(),
        }
    }
}

/// Flat, versioned export of a [`FitResult`].
///
/// Field names and units are stable: Hz for frequencies, log10 power for
/// offsets, amplitudes and errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitRecord {
    pub schema_version: u32,
    pub offset: f64,
    pub exponent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knee: Option<f64>,
    /// `[center_freq, amplitude, bandwidth]` per peak, detection order.
    pub peaks: Vec<[f64; 3]>,
    pub r_squared: f64,
    pub fit_error: f64,
    pub freq_res: f64,
    pub freq_low: f64,
    pub freq_high: f64,
    pub partial_fit: bool,
}

impl FitRecord {
    /// Rebuild a result from a record. Warning details other than the
    /// partial-fit flag are not part of the record.
    pub fn to_result(&self) -> FitResult {
        let warnings = if self.partial_fit {
            vec![FitWarning::PartialFit {
                reason: "restored from record".to_string(),
            }]
        } else {
            Vec::new()
        };
        FitResult {
            aperiodic: AperiodicParams {
                offset: self.offset,
                exponent: self.exponent,
                knee: self.knee,
            },
            peaks: self.peaks.iter().copied().map(PeakParams::from_array).collect(),
            r_squared: self.r_squared,
            fit_error: self.fit_error,
            freq_res: self.freq_res,
            freq_range: (self.freq_low, self.freq_high),
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum_rejects_unsorted_frequencies() {
        let err = Spectrum::new(vec![1.0, 3.0, 2.0], vec![1.0, 1.0, 1.0]).unwrap_err();
        assert!(matches!(err, FitError::InvalidInput(_)));
    }

    #[test]
    fn spectrum_rejects_length_mismatch() {
        let err = Spectrum::new(vec![1.0, 2.0], vec![1.0]).unwrap_err();
        assert!(matches!(err, FitError::InvalidInput(_)));
    }

    #[test]
    fn aperiodic_vector_layout_round_trips() {
        let knee = AperiodicParams {
            offset: 1.5,
            exponent: 2.0,
            knee: Some(10.0),
        };
        assert_eq!(AperiodicParams::from_slice(AperiodicMode::Knee, &knee.to_vec()), knee);
        assert_eq!(knee.mode(), AperiodicMode::Knee);
    }

    #[test]
    fn default_config_is_valid() {
        FitConfig::default().validate().unwrap();
    }

    #[test]
    fn config_rejects_reversed_width_limits() {
        let config = FitConfig {
            peak_width_limits: (4.0, 1.0),
            ..FitConfig::default()
        };
        assert!(matches!(config.validate(), Err(FitError::InvalidConfig(_))));
    }

    #[test]
    fn record_omits_knee_in_fixed_mode() {
        let result = FitResult {
            aperiodic: AperiodicParams {
                offset: 1.0,
                exponent: 1.0,
                knee: None,
            },
            peaks: vec![PeakParams {
                center_freq: 10.0,
                amplitude: 0.4,
                bandwidth: 1.0,
            }],
            r_squared: 0.99,
            fit_error: 0.01,
            freq_res: 0.5,
            freq_range: (3.0, 40.0),
            warnings: Vec::new(),
        };
        let json = serde_json::to_value(result.to_record()).unwrap();
        assert!(json.get("knee").is_none());
        assert_eq!(json["peaks"][0][0], 10.0);
        assert_eq!(json["schema_version"], 1);
        assert_eq!(result.to_record().to_result(), result);
    }
}
