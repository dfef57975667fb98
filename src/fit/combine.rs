//! Final aperiodic refit and joint refinement of all parameters.

use tracing::{debug, warn};

use crate::domain::{AperiodicMode, AperiodicParams, PeakParams, peaks_curve};
use crate::error::{FitError, FitStage};
use crate::fit::aperiodic::{aperiodic_bounds, fit_aperiodic};
use crate::math::{Bounds, LmOptions, fit_curve};
use crate::models::FullModel;

/// Peaks whose amplitude collapses to this or below during the joint refit are removed.
const MIN_JOINT_AMPLITUDE: f64 = 1e-9;
/// Joint refit center bound, in extracted bandwidths.
const CENTER_REACH_STDS: f64 = 3.0;

/// Parameters after the combine stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Combined {
    pub aperiodic: AperiodicParams,
    pub peaks: Vec<PeakParams>,
    /// Set when the joint refit failed and pre-refit estimates were kept.
    pub partial: Option<String>,
}

/// Refit the aperiodic curve on the peak-removed spectrum, then refine every
/// parameter jointly.
///
/// `aperiodic` seeds the aperiodic refit; `peaks` seed the joint refit.
/// A failed aperiodic refit is an error. A failed joint refit is not: the
/// result carries the pre-refit peaks and a `partial` reason.
pub fn combine(
    freqs: &[f64],
    log_power: &[f64],
    aperiodic: &AperiodicParams,
    peaks: &[PeakParams],
    width_limits: (f64, f64),
    aperiodic_iterations: usize,
    joint_iterations: usize,
) -> Result<Combined, FitError> {
    let mode = aperiodic.mode();
    let peak_fit = peaks_curve(peaks, freqs);
    let peak_removed: Vec<f64> = log_power
        .iter()
        .zip(peak_fit.iter())
        .map(|(y, p)| y - p)
        .collect();

    let refit = fit_aperiodic(
        freqs,
        &peak_removed,
        mode,
        Some(aperiodic.to_vec().as_slice()),
        aperiodic_iterations,
        FitStage::AperiodicFinal,
    )?;
    debug!(
        offset = refit.offset,
        exponent = refit.exponent,
        knee = ?refit.knee,
        "aperiodic refit on peak-removed spectrum"
    );

    if peaks.is_empty() {
        return Ok(Combined {
            aperiodic: refit,
            peaks: Vec::new(),
            partial: None,
        });
    }

    let model = FullModel::new(mode, peaks.len());
    let p0 = FullModel::pack(&refit, peaks);
    let bounds = joint_bounds(mode, peaks, width_limits);

    match fit_curve(
        &model,
        freqs,
        log_power,
        &p0,
        &bounds,
        &LmOptions::with_max_iterations(joint_iterations),
    ) {
        Ok(sol) => {
            let (aperiodic, fitted) = model.unpack(&sol.params);
            let peaks: Vec<PeakParams> = fitted
                .into_iter()
                .filter(|p| p.amplitude > MIN_JOINT_AMPLITUDE)
                .collect();
            debug!(
                n_peaks = peaks.len(),
                iterations = sol.iterations,
                "joint refit converged"
            );
            Ok(Combined {
                aperiodic,
                peaks,
                partial: None,
            })
        }
        Err(e) => {
            let reason = FitError::from_solve(FitStage::Joint, &e).to_string();
            warn!(%reason, "joint refit failed, keeping pre-refit parameters");
            Ok(Combined {
                aperiodic: refit,
                peaks: peaks.to_vec(),
                partial: Some(reason),
            })
        }
    }
}

/// Aperiodic bounds followed by one `[center, amplitude, bandwidth]` block per peak.
pub fn joint_bounds(mode: AperiodicMode, peaks: &[PeakParams], width_limits: (f64, f64)) -> Bounds {
    let mut bounds = aperiodic_bounds(mode);
    let (min_bw, max_bw) = width_limits;
    for p in peaks {
        let reach = CENTER_REACH_STDS * p.bandwidth;
        bounds.extend(&Bounds {
            lower: vec![p.center_freq - reach, 0.0, min_bw],
            upper: vec![p.center_freq + reach, f64::INFINITY, max_bw],
        });
    }
    bounds
}
