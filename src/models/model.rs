//! Model evaluation for the aperiodic, peak and combined curves.
//!
//! The solver relies on two primitive operations:
//! - predict `y(f)` given a flat parameter vector
//! - fill a gradient row for a given frequency (one Jacobian row)
//!
//! Parameter vector layouts:
//! - aperiodic: `[offset, exponent]` or `[offset, exponent, knee]`
//! - peaks:     `[c₀, a₀, σ₀, c₁, a₁, σ₁, ...]`
//! - full:      aperiodic block followed by the peaks block

use crate::domain::{AperiodicMode, AperiodicParams, PeakParams};
use crate::math::{
    CurveModel, aperiodic_fixed, aperiodic_fixed_grad, aperiodic_knee, aperiodic_knee_grad,
    gaussian, gaussian_grad,
};

/// Aperiodic background curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AperiodicModel {
    pub mode: AperiodicMode,
}

impl CurveModel for AperiodicModel {
    fn n_params(&self) -> usize {
        self.mode.n_params()
    }

    fn eval(&self, x: f64, p: &[f64]) -> f64 {
        match self.mode {
            AperiodicMode::Fixed => aperiodic_fixed(x, p[0], p[1]),
            AperiodicMode::Knee => aperiodic_knee(x, p[0], p[1], p[2]),
        }
    }

    fn fill_gradient(&self, x: f64, p: &[f64], out: &mut [f64]) {
        match self.mode {
            AperiodicMode::Fixed => aperiodic_fixed_grad(x, out),
            AperiodicMode::Knee => aperiodic_knee_grad(x, p[1], p[2], out),
        }
    }
}

/// Sum of `n_peaks` Gaussians.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaussianModel {
    pub n_peaks: usize,
}

impl CurveModel for GaussianModel {
    fn n_params(&self) -> usize {
        3 * self.n_peaks
    }

    fn eval(&self, x: f64, p: &[f64]) -> f64 {
        p.chunks_exact(3)
            .take(self.n_peaks)
            .map(|g| gaussian(x, g[0], g[1], g[2]))
            .sum()
    }

    fn fill_gradient(&self, x: f64, p: &[f64], out: &mut [f64]) {
        for (g, row) in p
            .chunks_exact(3)
            .zip(out.chunks_exact_mut(3))
            .take(self.n_peaks)
        {
            gaussian_grad(x, g[0], g[1], g[2], row);
        }
    }
}

/// Aperiodic background plus peaks, fitted jointly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullModel {
    pub aperiodic: AperiodicModel,
    pub peaks: GaussianModel,
}

impl FullModel {
    pub fn new(mode: AperiodicMode, n_peaks: usize) -> Self {
        Self {
            aperiodic: AperiodicModel { mode },
            peaks: GaussianModel { n_peaks },
        }
    }

    /// Flatten parameters into the solver layout.
    pub fn pack(aperiodic: &AperiodicParams, peaks: &[PeakParams]) -> Vec<f64> {
        let mut p = aperiodic.to_vec();
        for peak in peaks {
            p.extend_from_slice(&peak.to_array());
        }
        p
    }

    /// Split a solver vector back into typed parameters.
    pub fn unpack(&self, p: &[f64]) -> (AperiodicParams, Vec<PeakParams>) {
        let k = self.aperiodic.n_params();
        let aperiodic = AperiodicParams::from_slice(self.aperiodic.mode, &p[..k]);
        let peaks = p[k..]
            .chunks_exact(3)
            .map(|g| PeakParams::from_array([g[0], g[1], g[2]]))
            .collect();
        (aperiodic, peaks)
    }
}

impl CurveModel for FullModel {
    fn n_params(&self) -> usize {
        self.aperiodic.n_params() + self.peaks.n_params()
    }

    fn eval(&self, x: f64, p: &[f64]) -> f64 {
        let k = self.aperiodic.n_params();
        self.aperiodic.eval(x, &p[..k]) + self.peaks.eval(x, &p[k..])
    }

    fn fill_gradient(&self, x: f64, p: &[f64], out: &mut [f64]) {
        let k = self.aperiodic.n_params();
        let (ap_out, pk_out) = out.split_at_mut(k);
        self.aperiodic.fill_gradient(x, &p[..k], ap_out);
        self.peaks.fill_gradient(x, &p[k..], pk_out);
    }
}
