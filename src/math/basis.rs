//! Component functions of the spectral model and their partial derivatives.
//!
//! All curves live in log10-power space:
//!
//! - aperiodic, fixed: `offset - log10(f^χ)`
//! - aperiodic, knee:  `offset - log10(k + f^χ)`
//! - peak:             `a · exp(-(f - c)² / (2σ²))`
//!
//! Numerical notes:
//! - In fixed mode we evaluate `log10(f^χ)` as `χ · log10(f)`, which avoids
//!   overflow of `f^χ` for large exponents and is exact for `f > 0`.
//! - Gradient layouts match the solver parameter vectors:
//!   `[offset, exponent]`, `[offset, exponent, knee]`, `[center, amplitude, std]`.

use std::f64::consts::LN_10;

/// Conversion from full width at half maximum to Gaussian standard deviation.
pub const FWHM_PER_STD: f64 = 2.354_820_045_030_949_3; // 2·sqrt(2·ln 2)

pub fn aperiodic_fixed(f: f64, offset: f64, exponent: f64) -> f64 {
    offset - exponent * f.log10()
}

pub fn aperiodic_knee(f: f64, offset: f64, exponent: f64, knee: f64) -> f64 {
    offset - (knee + f.powf(exponent)).log10()
}

/// Gradient of [`aperiodic_fixed`] with respect to `[offset, exponent]`.
pub fn aperiodic_fixed_grad(f: f64, out: &mut [f64]) {
    out[0] = 1.0;
    out[1] = -f.log10();
}

/// Gradient of [`aperiodic_knee`] with respect to `[offset, exponent, knee]`.
pub fn aperiodic_knee_grad(f: f64, exponent: f64, knee: f64, out: &mut [f64]) {
    let f_exp = f.powf(exponent);
    let denom = (knee + f_exp) * LN_10;
    out[0] = 1.0;
    out[1] = -f_exp * f.ln() / denom;
    out[2] = -1.0 / denom;
}

pub fn gaussian(f: f64, center: f64, amplitude: f64, std: f64) -> f64 {
    let z = (f - center) / std;
    amplitude * (-0.5 * z * z).exp()
}

/// Gradient of [`gaussian`] with respect to `[center, amplitude, std]`.
pub fn gaussian_grad(f: f64, center: f64, amplitude: f64, std: f64, out: &mut [f64]) {
    let d = f - center;
    let z = d / std;
    let e = (-0.5 * z * z).exp();
    out[0] = amplitude * e * d / (std * std);
    out[1] = e;
    out[2] = amplitude * e * d * d / (std * std * std);
}
