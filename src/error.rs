//! Error types.
//!
//! Two layers:
//!
//! - [`FitError`]: failures of a single spectrum fit (library API). Each fit in a
//!   group fails independently with one of these.
//! - [`AppError`]: what the `specfit` binary reports, carrying a process exit code.

use thiserror::Error;

use crate::math::SolveError;

/// Pipeline stage that ran a least-squares solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStage {
    /// First pass of the robust aperiodic fit (all points).
    AperiodicInitial,
    /// Second pass of the robust aperiodic fit (background points only).
    AperiodicRobust,
    /// Aperiodic refit on the peak-removed spectrum.
    AperiodicFinal,
    /// Joint refit of aperiodic + peak parameters.
    Joint,
}

impl std::fmt::Display for FitStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FitStage::AperiodicInitial => "initial aperiodic fit",
            FitStage::AperiodicRobust => "robust aperiodic refit",
            FitStage::AperiodicFinal => "final aperiodic fit",
            FitStage::Joint => "joint refit",
        };
        f.write_str(label)
    }
}

/// Errors from fitting one spectrum.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// The requested range leaves too few points, includes 0 Hz, or contains
    /// non-positive power.
    #[error("range error: {0}")]
    Range(String),

    /// A least-squares solve did not converge within its iteration budget.
    #[error("{stage} did not converge after {iterations} iterations")]
    Convergence {
        /// Stage that failed.
        stage: FitStage,
        /// Iterations spent before giving up.
        iterations: usize,
    },

    /// Frequencies / powers are malformed (length mismatch, ordering, non-finite values).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Fit settings are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FitError {
    /// Map a solver failure in `stage` to a convergence error.
    pub fn from_solve(stage: FitStage, err: &SolveError) -> Self {
        FitError::Convergence {
            stage,
            iterations: err.iterations(),
        }
    }

    /// Short tag used in group exports.
    pub fn kind(&self) -> &'static str {
        match self {
            FitError::Range(_) => "range",
            FitError::Convergence { .. } => "convergence",
            FitError::InvalidInput(_) => "input",
            FitError::InvalidConfig(_) => "config",
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let exit_code = match err {
            FitError::InvalidConfig(_) | FitError::InvalidInput(_) => 2,
            FitError::Range(_) => 3,
            FitError::Convergence { .. } => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_errors_map_to_exit_codes() {
        let range: AppError = FitError::Range("too few points".into()).into();
        assert_eq!(range.exit_code(), 3);

        let conv: AppError = FitError::Convergence {
            stage: FitStage::Joint,
            iterations: 10,
        }
        .into();
        assert_eq!(conv.exit_code(), 4);
        assert!(conv.to_string().contains("joint refit"));
    }
}
