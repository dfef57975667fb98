//! CSV exports: group fit results and synthetic spectra.
//!
//! Both files are meant to be easy to consume in spreadsheets or downstream scripts.

use std::path::Path;

use crate::domain::FitResult;
use crate::error::{AppError, FitError};
use crate::group::GroupResults;

const GROUP_HEADER: [&str; 13] = [
    "spectrum",
    "status",
    "error_kind",
    "error",
    "offset",
    "exponent",
    "knee",
    "n_peaks",
    "peaks",
    "r_squared",
    "fit_error",
    "freq_res",
    "partial_fit",
];

/// One row per spectrum; failed fits are kept as tagged rows.
///
/// `peaks` is `center:amplitude:bandwidth` per peak, `;`-separated, in
/// detection order.
pub fn write_group_csv(path: &Path, labels: &[String], group: &GroupResults) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| {
        AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display()))
    })?;
    let write_err = |e: csv::Error| AppError::new(2, format!("Failed to write export CSV row: {e}"));

    writer.write_record(GROUP_HEADER).map_err(write_err)?;
    for (i, outcome) in group.results.iter().enumerate() {
        let label = labels.get(i).cloned().unwrap_or_else(|| format!("{i}"));
        let row = match outcome {
            Ok(result) => ok_row(label, result),
            Err(err) => error_row(label, err),
        };
        writer.write_record(&row).map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

fn ok_row(label: String, r: &FitResult) -> Vec<String> {
    let peaks = r
        .peaks
        .iter()
        .map(|p| format!("{:.4}:{:.4}:{:.4}", p.center_freq, p.amplitude, p.bandwidth))
        .collect::<Vec<_>>()
        .join(";");
    vec![
        label,
        "ok".to_string(),
        String::new(),
        String::new(),
        format!("{:.6}", r.aperiodic.offset),
        format!("{:.6}", r.aperiodic.exponent),
        r.aperiodic.knee.map(|k| format!("{k:.6}")).unwrap_or_default(),
        r.peaks.len().to_string(),
        peaks,
        format!("{:.6}", r.r_squared),
        format!("{:.6}", r.fit_error),
        format!("{:.6}", r.freq_res),
        r.is_partial().to_string(),
    ]
}

fn error_row(label: String, err: &FitError) -> Vec<String> {
    let mut row = vec![
        label,
        "error".to_string(),
        err.kind().to_string(),
        err.to_string(),
    ];
    row.resize(GROUP_HEADER.len(), String::new());
    row
}

/// Write spectra sharing one frequency axis: `freq,<label>...`.
pub fn write_spectra_csv(
    path: &Path,
    freqs: &[f64],
    labels: &[String],
    spectra: &[Vec<f64>],
) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| {
        AppError::new(2, format!("Failed to create spectrum CSV '{}': {e}", path.display()))
    })?;
    let write_err = |e: csv::Error| AppError::new(2, format!("Failed to write spectrum CSV: {e}"));

    let mut header = vec!["freq".to_string()];
    header.extend(labels.iter().cloned());
    writer.write_record(&header).map_err(write_err)?;

    for (i, f) in freqs.iter().enumerate() {
        let mut row = vec![f.to_string()];
        row.extend(spectra.iter().map(|s| s.get(i).map(f64::to_string).unwrap_or_default()));
        writer.write_record(&row).map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush spectrum CSV: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AperiodicParams, PeakParams};
    use crate::io::load_spectra;

    fn sample_result() -> FitResult {
        FitResult {
            aperiodic: AperiodicParams { offset: 1.0, exponent: 1.5, knee: None },
            peaks: vec![PeakParams { center_freq: 10.0, amplitude: 0.5, bandwidth: 1.0 }],
            r_squared: 0.99,
            fit_error: 0.01,
            freq_res: 0.5,
            freq_range: (3.0, 40.0),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn group_csv_keeps_error_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let group = GroupResults {
            results: vec![Ok(sample_result()), Err(FitError::Range("too few points".into()))],
        };
        write_group_csv(&path, &["a".to_string(), "b".to_string()], &group).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("a,ok,,,1.000000,1.500000,,1,10.0000:0.5000:1.0000"));
        assert!(lines[2].starts_with("b,error,range,"));
    }

    #[test]
    fn spectra_csv_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spectra.csv");
        let freqs = vec![1.0, 2.0, 3.0];
        let spectra = vec![vec![3.0, 2.0, 1.0], vec![0.5, 0.25, 0.125]];
        write_spectra_csv(&path, &freqs, &["x".into(), "y".into()], &spectra).unwrap();

        let table = load_spectra(&path).unwrap();
        assert_eq!(table.freqs, freqs);
        assert_eq!(table.spectra, spectra);
        assert_eq!(table.labels, vec!["x", "y"]);
    }
}
