//! Fitting many spectra that share one frequency axis.
//!
//! Each spectrum is fitted independently on the rayon pool; one failure never
//! affects the others. Results come back in input order.

use rayon::prelude::*;

use crate::domain::{FitConfig, FitResult, Spectrum};
use crate::error::FitError;
use crate::fit::fit;
use crate::math::mean;

/// Per-spectrum outcomes, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupResults {
    pub results: Vec<Result<FitResult, FitError>>,
}

impl GroupResults {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn n_ok(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn n_failed(&self) -> usize {
        self.len() - self.n_ok()
    }

    /// Successful fits with their input index.
    pub fn successes(&self) -> impl Iterator<Item = (usize, &FitResult)> {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().ok().map(|fit| (i, fit)))
    }

    /// Mean `r_squared` over successful fits, `None` if there are none.
    pub fn mean_r_squared(&self) -> Option<f64> {
        let values: Vec<f64> = self.successes().map(|(_, r)| r.r_squared).collect();
        (!values.is_empty()).then(|| mean(&values))
    }

    /// Mean `fit_error` over successful fits, `None` if there are none.
    pub fn mean_fit_error(&self) -> Option<f64> {
        let values: Vec<f64> = self.successes().map(|(_, r)| r.fit_error).collect();
        (!values.is_empty()).then(|| mean(&values))
    }

    /// Number of successful fits that kept pre-refit parameters.
    pub fn n_partial(&self) -> usize {
        self.successes().filter(|(_, r)| r.is_partial()).count()
    }
}

/// Fit every power vector in `spectra` against the shared `freqs`.
pub fn fit_group(freqs: &[f64], spectra: &[Vec<f64>], config: &FitConfig) -> GroupResults {
    let results = spectra
        .par_iter()
        .map(|powers| {
            let spectrum = Spectrum::new(freqs.to_vec(), powers.clone())?;
            fit(&spectrum, config)
        })
        .collect();
    GroupResults { results }
}
