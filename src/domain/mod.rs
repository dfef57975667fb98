//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the input spectrum (`Spectrum`) and fit settings (`FitConfig`)
//! - fitted parameters (`AperiodicParams`, `PeakParams`) and results (`FitResult`)
//! - the flat export record (`FitRecord`)
//! - structural comparison of settings / data info across fits

pub mod compare;
pub mod types;

pub use compare::*;
pub use types::*;
