//! Spectrum fitting.
//!
//! Responsibilities:
//!
//! - trim and log-convert the input spectrum
//! - robust aperiodic fit, peak extraction, joint refit
//! - goodness-of-fit evaluation

pub mod aperiodic;
pub mod combine;
pub mod evaluate;
pub mod fitter;
pub mod flatten;
pub mod peaks;
pub mod preprocess;

pub use aperiodic::*;
pub use combine::*;
pub use evaluate::*;
pub use fitter::*;
pub use flatten::*;
pub use peaks::*;
pub use preprocess::*;
