//! CSV ingest for spectra.
//!
//! Layout:
//! - one header row
//! - column 0 is frequency (Hz)
//! - every further column is one power spectrum (linear units) on that axis
//!
//! Ingest is strict: a row with a missing or non-numeric cell is an error
//! (exit code 2), since dropping it would silently change the frequency axis
//! of every spectrum in the file. Value checks (ordering, finiteness) are left
//! to `Spectrum::new` so that a bad column only fails its own fit.

use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::domain::Spectrum;
use crate::error::AppError;

/// Frequencies plus one power vector per data column.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectraTable {
    /// Header of each power column.
    pub labels: Vec<String>,
    pub freqs: Vec<f64>,
    /// `spectra[k]` is CSV column `k + 1`.
    pub spectra: Vec<Vec<f64>>,
}

impl SpectraTable {
    pub fn n_spectra(&self) -> usize {
        self.spectra.len()
    }

    /// Spectrum in CSV column `column` (1-based; column 0 holds frequencies).
    pub fn spectrum(&self, column: usize) -> Result<Spectrum, AppError> {
        if column == 0 || column > self.spectra.len() {
            return Err(AppError::new(
                2,
                format!(
                    "Column {column} is not a power column (expected 1..={}).",
                    self.spectra.len()
                ),
            ));
        }
        Spectrum::new(self.freqs.clone(), self.spectra[column - 1].clone()).map_err(AppError::from)
    }
}

/// Load a spectra CSV.
pub fn load_spectra(path: &Path) -> Result<SpectraTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    if headers.len() < 2 {
        return Err(AppError::new(
            2,
            "CSV needs a frequency column and at least one power column.",
        ));
    }
    let labels: Vec<String> = headers.iter().skip(1).map(normalize_header_name).collect();

    let mut freqs = Vec::new();
    let mut spectra = vec![Vec::new(); labels.len()];

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header; CSV lines are 1-based
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("CSV parse error on line {line}: {e}")))?;
        let values = parse_row(&record, headers.len())
            .map_err(|e| AppError::new(2, format!("Line {line}: {e}")))?;

        freqs.push(values[0]);
        for (column, v) in spectra.iter_mut().zip(values.iter().skip(1)) {
            column.push(*v);
        }
    }

    if freqs.is_empty() {
        return Err(AppError::new(3, "CSV has no data rows."));
    }

    Ok(SpectraTable {
        labels,
        freqs,
        spectra,
    })
}

fn normalize_header_name(name: &str) -> String {
    // Strip a UTF-8 BOM some spreadsheet tools prepend.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

fn parse_row(record: &StringRecord, n_columns: usize) -> Result<Vec<f64>, String> {
    if record.len() != n_columns {
        return Err(format!("expected {n_columns} fields, found {}", record.len()));
    }
    record
        .iter()
        .enumerate()
        .map(|(col, cell)| {
            cell.parse::<f64>()
                .map_err(|_| format!("column {col}: '{cell}' is not a number"))
        })
        .collect()
}
