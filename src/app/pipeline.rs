//! Shared fit workflows used by the CLI commands.
//!
//! CSV load -> spectrum selection -> fit (single or group)
//!
//! The command handlers can then focus on presentation and exports.

use std::path::Path;

use tracing::info;

use crate::domain::FitConfig;
use crate::error::AppError;
use crate::fit::{FittedSpectrum, fit_with_curves};
use crate::group::{GroupResults, fit_group};
use crate::io::{SpectraTable, load_spectra};

/// Outputs of a single-spectrum run.
#[derive(Debug, Clone)]
pub struct FitRun {
    pub label: String,
    pub fitted: FittedSpectrum,
}

/// Outputs of a group run.
#[derive(Debug, Clone)]
pub struct GroupRun {
    pub table: SpectraTable,
    pub group: GroupResults,
}

/// Fit CSV column `column` of `input`.
pub fn run_fit(input: &Path, column: usize, config: &FitConfig) -> Result<FitRun, AppError> {
    let table = load_spectra(input)?;
    let spectrum = table.spectrum(column)?;
    let label = table.labels[column - 1].clone();

    let fitted = fit_with_curves(&spectrum, config)?;
    info!(
        spectrum = %label,
        n_peaks = fitted.result.peaks.len(),
        r_squared = fitted.result.r_squared,
        "fit complete"
    );
    Ok(FitRun { label, fitted })
}

/// Fit every power column of `input`.
pub fn run_group(input: &Path, config: &FitConfig) -> Result<GroupRun, AppError> {
    let table = load_spectra(input)?;
    let group = fit_group(&table.freqs, &table.spectra, config);
    info!(
        n_spectra = group.len(),
        n_ok = group.n_ok(),
        n_failed = group.n_failed(),
        "group fit complete"
    );
    Ok(GroupRun { table, group })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::gen_group_power_spectra;
    use crate::domain::{AperiodicParams, PeakParams};
    use crate::io::write_spectra_csv;

    #[test]
    fn csv_to_group_results() {
        let aperiodic = AperiodicParams { offset: 1.0, exponent: 1.0, knee: None };
        let peaks = [PeakParams { center_freq: 12.0, amplitude: 0.4, bandwidth: 1.5 }];
        let (freqs, spectra) =
            gen_group_power_spectra(2, (3.0, 40.0), &aperiodic, &peaks, 0.0, 0, 0.5).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spectra.csv");
        write_spectra_csv(&path, &freqs, &["a".into(), "b".into()], &spectra).unwrap();

        let config = FitConfig { min_peak_height: 0.05, ..FitConfig::default() };
        let run = run_group(&path, &config).unwrap();
        assert_eq!(run.group.n_ok(), 2);

        let single = run_fit(&path, 2, &config).unwrap();
        assert_eq!(single.label, "b");
        assert_eq!(Ok(single.fitted.result), run.group.results[1].clone());
    }
}
