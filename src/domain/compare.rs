//! Consistency checks across several fits.
//!
//! Results are only comparable when they were produced with the same settings
//! and on the same frequency grid. Both checks are plain structural equality of
//! the corresponding records.

use crate::domain::{DataInfo, FitConfig, FitResult};

/// True when every config equals the first. Empty and single-element inputs are consistent.
pub fn settings_consistent(configs: &[FitConfig]) -> bool {
    all_equal(configs)
}

/// True when every data-info record equals the first.
pub fn data_info_consistent(infos: &[DataInfo]) -> bool {
    all_equal(infos)
}

/// Convenience: data-info consistency over a set of results.
pub fn results_comparable(results: &[FitResult]) -> bool {
    let infos: Vec<DataInfo> = results.iter().map(FitResult::data_info).collect();
    data_info_consistent(&infos)
}

fn all_equal<T: PartialEq>(items: &[T]) -> bool {
    items.windows(2).all(|w| w[0] == w[1])
}
