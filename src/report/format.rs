//! Report strings.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{
    AperiodicMode, DataInfo, FitConfig, FitResult, FitWarning, data_info_consistent,
    results_comparable, settings_consistent,
};
use crate::group::GroupResults;
use crate::io::ModelFile;

/// Format one fit: range, aperiodic parameters, peaks, goodness of fit, warnings.
pub fn format_results(result: &FitResult) -> String {
    let mut out = String::new();

    out.push_str("=== specfit - Power Spectrum Model ===\n");
    out.push_str(&format!(
        "Range: {:.2} - {:.2} Hz | resolution {:.2} Hz\n",
        result.freq_range.0, result.freq_range.1, result.freq_res
    ));

    let ap = &result.aperiodic;
    out.push_str(&format!("\nAperiodic ({}):\n", ap.mode().display_name()));
    match ap.knee {
        Some(knee) => out.push_str(&format!(
            "- offset={:.4} knee={:.4} exponent={:.4}\n",
            ap.offset, knee, ap.exponent
        )),
        None => out.push_str(&format!(
            "- offset={:.4} exponent={:.4}\n",
            ap.offset, ap.exponent
        )),
    }

    out.push_str(&format!("\nPeaks: {}\n", result.peaks.len()));
    if result.has_peaks() {
        out.push_str(
            format!("{:>4} {:>10} {:>10} {:>10}\n", "#", "cf_hz", "amp_log", "bw_hz").trim_end(),
        );
        out.push('\n');
        out.push_str(format!("{:-<4} {:-<10} {:-<10} {:-<10}\n", "", "", "", "").trim_end());
        out.push('\n');
        for (i, p) in result.peaks.iter().enumerate() {
            out.push_str(&format!(
                "{:>4} {:>10.2} {:>10.3} {:>10.2}\n",
                i + 1,
                p.center_freq,
                p.amplitude,
                p.bandwidth
            ));
        }
    }

    out.push_str("\nGoodness of fit:\n");
    out.push_str(&format!("- r_squared={:.4}\n", result.r_squared));
    out.push_str(&format!("- fit_error={:.4} (mean abs, log10 power)\n", result.fit_error));

    for w in &result.warnings {
        out.push_str(&format!("\nwarning: {}\n", format_warning(w)));
    }

    out
}

pub fn format_warning(warning: &FitWarning) -> String {
    match warning {
        FitWarning::PartialFit { reason } => {
            format!("joint refit skipped, pre-refit parameters reported ({reason})")
        }
        FitWarning::ResolutionNearWidthLimit {
            freq_res,
            min_bandwidth,
        } => format!(
            "frequency resolution {freq_res:.2} Hz is not below the lower bandwidth limit \
             {min_bandwidth:.2} Hz; narrow peaks may be overfit"
        ),
    }
}

/// Format fit settings, one per line, optionally with a short description each.
pub fn format_settings(config: &FitConfig, describe: bool) -> String {
    let range = match config.freq_range {
        Some((lo, hi)) => format!("[{lo}, {hi}] Hz"),
        None => "full spectrum".to_string(),
    };
    let max_peaks = match config.max_n_peaks {
        Some(n) => n.to_string(),
        None => "unlimited".to_string(),
    };
    let mode = match config.aperiodic_mode {
        AperiodicMode::Fixed => "fixed",
        AperiodicMode::Knee => "knee",
    };

    let rows: [(&str, String, &str); 10] = [
        ("freq_range", range, "frequencies kept for fitting (inclusive)"),
        (
            "peak_width_limits",
            format!("[{}, {}] Hz", config.peak_width_limits.0, config.peak_width_limits.1),
            "accepted peak bandwidth (gaussian std)",
        ),
        ("max_n_peaks", max_peaks, "maximum number of peaks"),
        (
            "min_peak_height",
            config.min_peak_height.to_string(),
            "absolute peak height floor (log10 power)",
        ),
        (
            "peak_threshold",
            config.peak_threshold.to_string(),
            "relative peak height floor (residual std devs)",
        ),
        ("aperiodic_mode", mode.to_string(), "fixed: no knee, knee: with knee"),
        (
            "aperiodic_percentile",
            config.aperiodic_percentile.to_string(),
            "residual percentile for robust background points",
        ),
        (
            "peak_edge_std",
            config.peak_edge_std.to_string(),
            "edge exclusion (bandwidths)",
        ),
        (
            "peak_overlap_std",
            config.peak_overlap_std.to_string(),
            "overlap exclusion (bandwidths)",
        ),
        (
            "max_iterations",
            config.max_iterations.to_string(),
            "solver iteration budget",
        ),
    ];

    let mut out = String::from("Settings:\n");
    for (name, value, description) in rows {
        if describe {
            out.push_str(&format!("- {name:<21} {value:<16} {description}\n"));
        } else {
            out.push_str(&format!("- {name:<21} {value}\n"));
        }
    }
    out
}

/// Format a group: counts, aggregate fit quality and one line per spectrum.
pub fn format_group_summary(group: &GroupResults, labels: &[String]) -> String {
    let mut out = String::new();

    out.push_str("=== specfit - Group Fit ===\n");
    out.push_str(&format!(
        "Spectra: n={} | ok={} | failed={} | partial={}\n",
        group.len(),
        group.n_ok(),
        group.n_failed(),
        group.n_partial()
    ));
    if let (Some(r2), Some(err)) = (group.mean_r_squared(), group.mean_fit_error()) {
        out.push_str(&format!("Mean r_squared={r2:.4} | mean fit_error={err:.4}\n"));
    }
    let fits: Vec<FitResult> = group.successes().map(|(_, r)| r.clone()).collect();
    if !results_comparable(&fits) {
        out.push_str("warning: fits differ in frequency range or resolution\n");
    }

    out.push('\n');
    out.push_str(
        format!(
            "{:<16} {:>8} {:>10} {:>6} {:>10}\n",
            "spectrum", "status", "exponent", "peaks", "r_squared"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<16} {:-<8} {:-<10} {:-<6} {:-<10}\n", "", "", "", "", "").trim_end());
    out.push('\n');

    for (i, outcome) in group.results.iter().enumerate() {
        let label = labels.get(i).cloned().unwrap_or_else(|| i.to_string());
        let line = match outcome {
            Ok(r) => format!(
                "{:<16} {:>8} {:>10.4} {:>6} {:>10.4}",
                truncate(&label, 16),
                if r.is_partial() { "partial" } else { "ok" },
                r.aperiodic.exponent,
                r.peaks.len(),
                r.r_squared
            ),
            Err(e) => format!("{:<16} {:>8} {}", truncate(&label, 16), "error", e),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

/// Whether saved models can be compared: same settings, same frequency grid.
pub fn format_model_comparison(models: &[ModelFile]) -> String {
    let settings: Vec<FitConfig> = models.iter().map(|m| m.settings.clone()).collect();
    let infos: Vec<DataInfo> = models
        .iter()
        .map(|m| DataInfo {
            freq_range: (m.record.freq_low, m.record.freq_high),
            freq_res: m.record.freq_res,
        })
        .collect();

    let yes_no = |b: bool| if b { "yes" } else { "no" };
    format!(
        "Comparison of {} models:\n- same settings: {}\n- same frequency grid: {}\n",
        models.len(),
        yes_no(settings_consistent(&settings)),
        yes_no(data_info_consistent(&infos))
    )
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
