//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads spectra and fit settings
//! - runs single or group fits
//! - prints reports and writes optional exports

use clap::Parser;
use tracing::info;

use crate::cli::{Command, FitArgs, FitFlags, GroupArgs, ShowArgs, SimArgs};
use crate::domain::FitConfig;
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `specfit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Group(args) => handle_group(args),
        Command::Sim(args) => handle_sim(args),
        Command::Show(args) => handle_show(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args.flags)?;
    let run = pipeline::run_fit(&args.input, args.column, &config)?;

    if args.show_settings {
        println!("{}", crate::report::format_settings(&config, true));
    }
    println!("{}", crate::report::format_results(&run.fitted.result));

    if let Some(path) = &args.export_model {
        let model = crate::io::ModelFile::new(&run.fitted, &config);
        crate::io::write_model_json(path, &model)?;
        info!(path = %path.display(), "model exported");
    }
    Ok(())
}

fn handle_group(args: GroupArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args.flags)?;
    let run = pipeline::run_group(&args.input, &config)?;

    println!(
        "{}",
        crate::report::format_group_summary(&run.group, &run.table.labels)
    );

    if let Some(path) = &args.export {
        crate::io::write_group_csv(path, &run.table.labels, &run.group)?;
        info!(path = %path.display(), "group results exported");
    }
    Ok(())
}

fn handle_sim(args: SimArgs) -> Result<(), AppError> {
    let range = pair(&args.freq_range, "--freq-range")?;
    let (freqs, spectra) = crate::data::gen_group_power_spectra(
        args.n_spectra.max(1),
        range,
        &args.aperiodic,
        &args.peaks,
        args.noise,
        args.seed,
        args.freq_res,
    )?;
    let labels: Vec<String> = (1..=spectra.len()).map(|i| format!("power_{i}")).collect();
    crate::io::write_spectra_csv(&args.output, &freqs, &labels, &spectra)?;

    println!(
        "Wrote {} spectra x {} frequencies to {}",
        spectra.len(),
        freqs.len(),
        args.output.display()
    );
    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let models = args
        .models
        .iter()
        .map(|path| crate::io::read_model_json(path))
        .collect::<Result<Vec<_>, _>>()?;

    for model in &models {
        if args.settings {
            println!("{}", crate::report::format_settings(&model.settings, true));
        }
        println!("{}", crate::report::format_results(&model.record.to_result()));
    }

    if models.len() > 1 {
        println!("{}", crate::report::format_model_comparison(&models));
    }
    Ok(())
}

/// Resolve fit settings: a `--settings` file wins, otherwise the individual flags.
pub fn fit_config_from_args(flags: &FitFlags) -> Result<FitConfig, AppError> {
    let config = match &flags.settings {
        Some(path) => crate::io::read_settings_json(path)?,
        None => FitConfig {
            freq_range: match &flags.freq_range {
                Some(range) => Some(pair(range, "--freq-range")?),
                None => None,
            },
            peak_width_limits: pair(&flags.peak_width_limits, "--peak-width-limits")?,
            max_n_peaks: flags.max_n_peaks,
            min_peak_height: flags.min_peak_height,
            peak_threshold: flags.peak_threshold,
            aperiodic_mode: flags.aperiodic_mode,
            aperiodic_percentile: flags.aperiodic_percentile,
            peak_edge_std: flags.peak_edge_std,
            peak_overlap_std: flags.peak_overlap_std,
            max_iterations: flags.max_iterations,
        },
    };
    config.validate()?;
    Ok(config)
}

fn pair(values: &[f64], flag: &str) -> Result<(f64, f64), AppError> {
    match values {
        [a, b] => Ok((*a, *b)),
        _ => Err(AppError::new(2, format!("{flag} takes exactly two values."))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    fn flags(argv: &[&str]) -> FitFlags {
        let mut full = vec!["specfit", "group", "--input", "x.csv"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Group(args) => args.flags,
            _ => panic!("expected group"),
        }
    }

    #[test]
    fn default_flags_match_default_config() {
        assert_eq!(fit_config_from_args(&flags(&[])).unwrap(), FitConfig::default());
    }

    #[test]
    fn reversed_range_is_a_config_error() {
        let err = fit_config_from_args(&flags(&["--freq-range", "40", "3"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn settings_file_replaces_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"peak_threshold": 3.5}"#).unwrap();

        let path_str = path.to_string_lossy().to_string();
        let config =
            fit_config_from_args(&flags(&["--settings", &path_str, "--peak-threshold", "1.0"]))
                .unwrap();
        assert_eq!(config.peak_threshold, 3.5);
    }
}
