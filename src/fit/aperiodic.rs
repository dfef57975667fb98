//! Aperiodic (background) fitting.
//!
//! Two entry points:
//!
//! - [`fit_aperiodic`]: one bounded least-squares fit of the aperiodic curve
//! - [`fit_aperiodic_robust`]: the two-pass fit used on a spectrum that still
//!   contains peaks
//!
//! Robust strategy:
//! - fit all points to get a rough trend (peaks pull it upward)
//! - flatten against that trend and clip negative residuals to 0
//! - keep points whose clipped residual is at or below the configured
//!   percentile; those sit on or under the trend and are presumed peak-free
//! - refit on the kept points, starting from the first-pass parameters

use tracing::debug;

use crate::domain::{AperiodicMode, AperiodicParams};
use crate::error::{FitError, FitStage};
use crate::fit::flatten::flatten_with;
use crate::math::{Bounds, LmOptions, fit_curve, percentile};
use crate::models::AperiodicModel;

/// Box constraints: offset free, exponent and knee non-negative.
pub fn aperiodic_bounds(mode: AperiodicMode) -> Bounds {
    let mut bounds = Bounds::unbounded(mode.n_params());
    bounds.lower[1] = 0.0;
    if mode == AperiodicMode::Knee {
        bounds.lower[2] = 0.0;
    }
    bounds
}

/// Data-driven starting point.
///
/// - offset: first log-power value
/// - exponent: negative log-log slope between the first and last points
/// - knee: zero
pub fn initial_guess(freqs: &[f64], log_power: &[f64], mode: AperiodicMode) -> Vec<f64> {
    let n = freqs.len();
    let offset = log_power[0];

    let dx = freqs[n - 1].log10() - freqs[0].log10();
    let slope = (log_power[n - 1] - log_power[0]) / dx;
    // `0.0 - slope` keeps a flat spectrum at +0.0 instead of -0.0.
    let exponent = if slope.is_finite() { 0.0 - slope } else { 0.0 };

    let mut guess = vec![offset, exponent];
    if mode == AperiodicMode::Knee {
        guess.push(0.0);
    }
    aperiodic_bounds(mode).project(&mut guess);
    guess
}

/// Fit the aperiodic curve to `(freqs, log_power)`.
///
/// `guess` defaults to [`initial_guess`].
pub fn fit_aperiodic(
    freqs: &[f64],
    log_power: &[f64],
    mode: AperiodicMode,
    guess: Option<&[f64]>,
    max_iterations: usize,
    stage: FitStage,
) -> Result<AperiodicParams, FitError> {
    let p0 = match guess {
        Some(g) => g.to_vec(),
        None => initial_guess(freqs, log_power, mode),
    };
    let model = AperiodicModel { mode };
    let sol = fit_curve(
        &model,
        freqs,
        log_power,
        &p0,
        &aperiodic_bounds(mode),
        &LmOptions::with_max_iterations(max_iterations),
    )
    .map_err(|e| FitError::from_solve(stage, &e))?;

    Ok(AperiodicParams::from_slice(mode, &sol.params))
}

/// Output of the two-pass robust fit.
#[derive(Debug, Clone, PartialEq)]
pub struct RobustAperiodicFit {
    /// First-pass parameters (all points).
    pub initial: AperiodicParams,
    /// Second-pass parameters (background points only).
    pub params: AperiodicParams,
    /// Number of points used by the second pass.
    pub n_background: usize,
}

/// Two-pass, peak-resistant aperiodic fit.
///
/// `percentile_thresh` (0–100) selects the threshold on the clipped first-pass residual.
pub fn fit_aperiodic_robust(
    freqs: &[f64],
    log_power: &[f64],
    mode: AperiodicMode,
    percentile_thresh: f64,
    max_iterations: usize,
) -> Result<RobustAperiodicFit, FitError> {
    let initial = fit_aperiodic(
        freqs,
        log_power,
        mode,
        None,
        max_iterations,
        FitStage::AperiodicInitial,
    )?;

    let clipped: Vec<f64> = flatten_with(freqs, log_power, &initial)
        .into_iter()
        .map(|v| v.max(0.0))
        .collect();
    let thresh = percentile(&clipped, percentile_thresh).unwrap_or(0.0);

    let (mut bg_freqs, mut bg_power): (Vec<f64>, Vec<f64>) = freqs
        .iter()
        .zip(log_power.iter())
        .zip(clipped.iter())
        .filter(|(_, r)| **r <= thresh)
        .map(|((&f, &y), _)| (f, y))
        .unzip();

    // Too few background points to identify the curve: use everything.
    if bg_freqs.len() < mode.n_params() + 1 {
        bg_freqs = freqs.to_vec();
        bg_power = log_power.to_vec();
    }

    debug!(
        n_points = freqs.len(),
        n_background = bg_freqs.len(),
        threshold = thresh,
        "robust aperiodic refit"
    );

    let params = fit_aperiodic(
        &bg_freqs,
        &bg_power,
        mode,
        Some(initial.to_vec().as_slice()),
        max_iterations,
        FitStage::AperiodicRobust,
    )?;

    Ok(RobustAperiodicFit {
        initial,
        params,
        n_background: bg_freqs.len(),
    })
}
