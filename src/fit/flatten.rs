//! Flattening: log power minus the current aperiodic estimate.

use crate::domain::AperiodicParams;

/// `flattened[i] = log_power[i] - aperiodic_curve[i]`
pub fn flatten(log_power: &[f64], aperiodic_curve: &[f64]) -> Vec<f64> {
    log_power
        .iter()
        .zip(aperiodic_curve.iter())
        .map(|(y, a)| y - a)
        .collect()
}

/// Flatten against `aperiodic` evaluated on `freqs`.
pub fn flatten_with(freqs: &[f64], log_power: &[f64], aperiodic: &AperiodicParams) -> Vec<f64> {
    flatten(log_power, &aperiodic.curve(freqs))
}
