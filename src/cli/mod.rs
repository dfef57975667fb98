//! Command-line parsing for the spectrum fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from
//! command dispatch and the fitting code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{AperiodicMode, AperiodicParams, PeakParams};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "specfit", version, about = "Power spectrum parameterization: aperiodic background + Gaussian peaks")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit one spectrum from a CSV column and print the results report.
    Fit(FitArgs),
    /// Fit every power column of a CSV and print a group summary.
    Group(GroupArgs),
    /// Write a synthetic spectrum CSV.
    Sim(SimArgs),
    /// Re-print the report of a saved model JSON.
    Show(ShowArgs),
}

/// Fit settings. Ignored when `--settings` is given.
#[derive(Debug, Args, Clone)]
pub struct FitFlags {
    /// Saved settings JSON; replaces every other fit flag.
    #[arg(long, value_name = "JSON")]
    pub settings: Option<PathBuf>,

    /// Inclusive frequency range to fit (Hz).
    #[arg(long, num_args = 2, value_names = ["LO", "HI"])]
    pub freq_range: Option<Vec<f64>>,

    /// Accepted peak bandwidth range (Gaussian std, Hz).
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], default_values_t = [0.5, 12.0])]
    pub peak_width_limits: Vec<f64>,

    /// Maximum number of peaks (unlimited when omitted).
    #[arg(long)]
    pub max_n_peaks: Option<usize>,

    /// Absolute peak height floor (log10 power).
    #[arg(long, default_value_t = 0.0)]
    pub min_peak_height: f64,

    /// Relative peak height floor (standard deviations of the residual).
    #[arg(long, default_value_t = 2.0)]
    pub peak_threshold: f64,

    /// Aperiodic model.
    #[arg(long, value_enum, default_value_t = AperiodicMode::Fixed)]
    pub aperiodic_mode: AperiodicMode,

    /// Residual percentile (0-100) selecting background points for the robust refit.
    #[arg(long, default_value_t = 0.025)]
    pub aperiodic_percentile: f64,

    /// Drop peaks within this many bandwidths of the range edges.
    #[arg(long, default_value_t = 1.0)]
    pub peak_edge_std: f64,

    /// Overlap half-width (bandwidths) for dropping the weaker of two peaks.
    #[arg(long, default_value_t = 0.75)]
    pub peak_overlap_std: f64,

    /// Iteration budget for each least-squares solve.
    #[arg(long, default_value_t = 1000)]
    pub max_iterations: usize,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Spectra CSV (column 0 = frequency).
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    /// Power column to fit (1-based).
    #[arg(short, long, default_value_t = 1)]
    pub column: usize,

    #[command(flatten)]
    pub flags: FitFlags,

    /// Print the settings (with descriptions) before the results.
    #[arg(long)]
    pub show_settings: bool,

    /// Export settings, record and curves to JSON.
    #[arg(long = "export-model", value_name = "JSON")]
    pub export_model: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct GroupArgs {
    /// Spectra CSV (column 0 = frequency, one spectrum per further column).
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    #[command(flatten)]
    pub flags: FitFlags,

    /// Export one result row per spectrum to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SimArgs {
    /// Output CSV.
    #[arg(short, long, value_name = "CSV")]
    pub output: PathBuf,

    /// Frequency range (Hz, inclusive).
    #[arg(long, num_args = 2, value_names = ["LO", "HI"], required = true)]
    pub freq_range: Vec<f64>,

    /// Frequency resolution (Hz).
    #[arg(long, default_value_t = 0.5)]
    pub freq_res: f64,

    /// Aperiodic parameters `OFFSET,EXPONENT` or `OFFSET,KNEE,EXPONENT`.
    #[arg(long, value_parser = parse_aperiodic, allow_hyphen_values = true)]
    pub aperiodic: AperiodicParams,

    /// Peak `CF,AMP,BW` (repeatable).
    #[arg(long = "peak", value_parser = parse_peak)]
    pub peaks: Vec<PeakParams>,

    /// White noise standard deviation (log10 power).
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Number of spectra (columns) to write.
    #[arg(short = 'n', long, default_value_t = 1)]
    pub n_spectra: usize,
}

#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    /// Model JSON written by `specfit fit --export-model` (repeatable).
    #[arg(long = "model", value_name = "JSON", required = true)]
    pub models: Vec<PathBuf>,

    /// Also print the settings the model was fitted with.
    #[arg(long)]
    pub settings: bool,
}

fn parse_numbers(s: &str) -> Result<Vec<f64>, String> {
    s.split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("'{part}' is not a number"))
        })
        .collect()
}

/// `OFFSET,EXPONENT` (fixed) or `OFFSET,KNEE,EXPONENT` (knee).
pub fn parse_aperiodic(s: &str) -> Result<AperiodicParams, String> {
    match parse_numbers(s)?.as_slice() {
        [offset, exponent] => Ok(AperiodicParams {
            offset: *offset,
            exponent: *exponent,
            knee: None,
        }),
        [offset, knee, exponent] => Ok(AperiodicParams {
            offset: *offset,
            exponent: *exponent,
            knee: Some(*knee),
        }),
        other => Err(format!("expected 2 or 3 values, got {}", other.len())),
    }
}

/// `CF,AMP,BW`
pub fn parse_peak(s: &str) -> Result<PeakParams, String> {
    match parse_numbers(s)?.as_slice() {
        [cf, amp, bw] => Ok(PeakParams {
            center_freq: *cf,
            amplitude: *amp,
            bandwidth: *bw,
        }),
        other => Err(format!("expected CF,AMP,BW, got {} values", other.len())),
    }
}
