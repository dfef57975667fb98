//! Parametric spectral models.
//!
//! Models are small structs implementing [`crate::math::CurveModel`] so that the
//! solver code can stay generic.

pub mod model;

pub use model::*;
