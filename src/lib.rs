//! `specfit` library crate.
//!
//! Parameterizes power spectra as an aperiodic (1/f-like) background plus a
//! set of Gaussian peaks, fitted in log10 power.
//!
//! The binary (`specfit`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the fitter is reusable from other Rust code

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod group;
pub mod io;
pub mod math;
pub mod models;
pub mod report;

pub use domain::{
    AperiodicMode, AperiodicParams, FitConfig, FitRecord, FitResult, FitWarning, PeakParams,
    Spectrum,
};
pub use error::{FitError, FitStage};
pub use fit::{FittedSpectrum, fit, fit_with_curves};
pub use group::{GroupResults, fit_group};
