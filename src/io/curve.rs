//! Read/write model JSON files.
//!
//! A model file is the portable form of one fit:
//! - the settings it was fitted with
//! - the flat [`FitRecord`]
//! - the fitted curves on the fitted frequencies, for quick plotting elsewhere

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{FitConfig, FitRecord, RECORD_SCHEMA_VERSION};
use crate::error::AppError;
use crate::fit::FittedSpectrum;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCurves {
    pub freqs: Vec<f64>,
    pub log_power: Vec<f64>,
    pub aperiodic_fit: Vec<f64>,
    pub peak_fit: Vec<f64>,
    pub model_fit: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub tool: String,
    pub settings: FitConfig,
    pub record: FitRecord,
    pub curves: ModelCurves,
}

impl ModelFile {
    pub fn new(fitted: &FittedSpectrum, settings: &FitConfig) -> Self {
        Self {
            tool: "specfit".to_string(),
            settings: settings.clone(),
            record: fitted.result.to_record(),
            curves: ModelCurves {
                freqs: fitted.freqs.clone(),
                log_power: fitted.log_power.clone(),
                aperiodic_fit: fitted.aperiodic_fit.clone(),
                peak_fit: fitted.peak_fit.clone(),
                model_fit: fitted.model_fit.clone(),
            },
        }
    }
}

/// Write a model JSON file.
pub fn write_model_json(path: &Path, model: &ModelFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create model JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, model)
        .map_err(|e| AppError::new(2, format!("Failed to write model JSON: {e}")))?;
    Ok(())
}

/// Read a model JSON file, rejecting unknown record versions.
pub fn read_model_json(path: &Path) -> Result<ModelFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open model JSON '{}': {e}", path.display())))?;
    let model: ModelFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid model JSON: {e}")))?;
    if model.record.schema_version != RECORD_SCHEMA_VERSION {
        return Err(AppError::new(
            2,
            format!(
                "Unsupported record schema version {} (expected {RECORD_SCHEMA_VERSION}).",
                model.record.schema_version
            ),
        ));
    }
    Ok(model)
}

/// Load fit settings saved as JSON (a bare [`FitConfig`]); missing fields take defaults.
pub fn read_settings_json(path: &Path) -> Result<FitConfig, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open settings JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid settings JSON: {e}")))
}
