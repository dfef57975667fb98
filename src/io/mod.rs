//! Input/output helpers.
//!
//! - spectra CSV ingest (`ingest`)
//! - group result / spectra CSV exports (`export`)
//! - model and settings JSON read/write (`curve`)

pub mod curve;
pub mod export;
pub mod ingest;

pub use curve::*;
pub use export::*;
pub use ingest::*;
