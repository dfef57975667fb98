//! Formatted terminal output for fits, settings and groups.

pub mod format;

pub use format::*;
