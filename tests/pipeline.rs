//! End-to-end fits of synthetic spectra.

use specfit::data::{gen_group_power_spectra, gen_power_spectrum};
use specfit::error::{FitError, FitStage};
use specfit::fit::{evaluate, fit, fit_aperiodic, fit_with_curves};
use specfit::group::fit_group;
use specfit::{AperiodicMode, AperiodicParams, FitConfig, PeakParams, Spectrum};

fn config() -> FitConfig {
    FitConfig {
        min_peak_height: 0.05,
        ..FitConfig::default()
    }
}

fn synth(aperiodic: &AperiodicParams, peaks: &[PeakParams], noise: f64, seed: u64) -> Spectrum {
    let (freqs, powers) = gen_power_spectrum((3.0, 40.0), aperiodic, peaks, noise, seed, 0.5).unwrap();
    Spectrum::new(freqs, powers).unwrap()
}

fn two_peaks() -> [PeakParams; 2] {
    [
        PeakParams { center_freq: 10.0, amplitude: 0.5, bandwidth: 1.0 },
        PeakParams { center_freq: 22.0, amplitude: 0.3, bandwidth: 2.0 },
    ]
}

fn background() -> AperiodicParams {
    AperiodicParams { offset: 1.0, exponent: 1.0, knee: None }
}

#[test]
fn noiseless_spectrum_round_trips() {
    let truth = two_peaks();
    let result = fit(&synth(&background(), &truth, 0.0, 0), &config()).unwrap();

    assert!((result.aperiodic.offset - 1.0).abs() < 0.02, "{:?}", result.aperiodic);
    assert!((result.aperiodic.exponent - 1.0).abs() < 0.02, "{:?}", result.aperiodic);
    assert_eq!(result.peaks.len(), 2, "{:?}", result.peaks);
    for want in &truth {
        let got = result
            .peaks
            .iter()
            .min_by(|a, b| {
                (a.center_freq - want.center_freq)
                    .abs()
                    .total_cmp(&(b.center_freq - want.center_freq).abs())
            })
            .unwrap();
        assert!((got.center_freq - want.center_freq).abs() < 0.05, "{got:?}");
        assert!((got.amplitude - want.amplitude).abs() < 0.02, "{got:?}");
        assert!((got.bandwidth - want.bandwidth).abs() < 0.05, "{got:?}");
    }
    assert!(result.r_squared > 0.999);
    assert!(!result.is_partial());
}

#[test]
fn tallest_peak_is_reported_first() {
    let result = fit(&synth(&background(), &two_peaks(), 0.0, 0), &config()).unwrap();
    assert!((result.peaks[0].center_freq - 10.0).abs() < 0.05);
}

#[test]
fn aperiodic_only_spectrum_has_no_peaks() {
    let ap = AperiodicParams { offset: 0.5, exponent: 1.7, knee: None };
    let result = fit(&synth(&ap, &[], 0.0, 0), &config()).unwrap();

    assert!(result.peaks.is_empty());
    assert!(!result.has_peaks());
    assert!((result.aperiodic.offset - 0.5).abs() < 0.02);
    assert!((result.aperiodic.exponent - 1.7).abs() < 0.02);
}

#[test]
fn peaks_never_increase_the_error() {
    let spectrum = synth(&background(), &two_peaks(), 0.02, 11);
    let fitted = fit_with_curves(&spectrum, &config()).unwrap();

    let ap_only = fit_aperiodic(
        &fitted.freqs,
        &fitted.log_power,
        specfit::AperiodicMode::Fixed,
        None,
        1000,
        FitStage::AperiodicInitial,
    )
    .unwrap();
    let ap_only_error = evaluate(&fitted.log_power, &ap_only.curve(&fitted.freqs)).fit_error;

    assert!(
        fitted.result.fit_error <= ap_only_error,
        "full {} vs aperiodic-only {}",
        fitted.result.fit_error,
        ap_only_error
    );
}

#[test]
fn refitting_the_model_is_a_fixed_point() {
    let ap = AperiodicParams { offset: 0.5, exponent: 1.8, knee: None };
    let peaks = [
        PeakParams { center_freq: 8.0, amplitude: 0.6, bandwidth: 1.2 },
        PeakParams { center_freq: 18.0, amplitude: 0.4, bandwidth: 2.5 },
    ];
    let first = fit_with_curves(&synth(&ap, &peaks, 0.0, 0), &config()).unwrap();

    let powers: Vec<f64> = first.model_fit.iter().map(|v| 10f64.powf(*v)).collect();
    let second = fit(&Spectrum::new(first.freqs.clone(), powers).unwrap(), &config()).unwrap();

    let a = &first.result;
    assert!((a.aperiodic.offset - second.aperiodic.offset).abs() < 1e-3);
    assert!((a.aperiodic.exponent - second.aperiodic.exponent).abs() < 1e-3);
    assert_eq!(a.peaks.len(), second.peaks.len());
    for (p, q) in a.peaks.iter().zip(second.peaks.iter()) {
        assert!((p.center_freq - q.center_freq).abs() < 1e-3, "{p:?} vs {q:?}");
        assert!((p.amplitude - q.amplitude).abs() < 1e-3, "{p:?} vs {q:?}");
        assert!((p.bandwidth - q.bandwidth).abs() < 1e-3, "{p:?} vs {q:?}");
    }
}

fn knee_config() -> FitConfig {
    FitConfig {
        aperiodic_mode: AperiodicMode::Knee,
        ..config()
    }
}

fn knee_background() -> AperiodicParams {
    AperiodicParams { offset: 2.0, exponent: 2.0, knee: Some(50.0) }
}

fn knee_synth(peaks: &[PeakParams]) -> Spectrum {
    let (freqs, powers) = gen_power_spectrum((1.0, 60.0), &knee_background(), peaks, 0.0, 0, 0.5).unwrap();
    Spectrum::new(freqs, powers).unwrap()
}

#[test]
fn knee_background_without_peaks_is_recovered() {
    let result = fit(&knee_synth(&[]), &knee_config()).unwrap();

    assert!(result.peaks.is_empty(), "{:?}", result.peaks);
    assert!((result.aperiodic.offset - 2.0).abs() < 0.02, "{:?}", result.aperiodic);
    assert!((result.aperiodic.exponent - 2.0).abs() < 0.02, "{:?}", result.aperiodic);
    let knee = result.aperiodic.knee.unwrap();
    assert!((knee - 50.0).abs() < 1.0, "knee = {knee}");
}

#[test]
fn knee_spectrum_round_trips() {
    let truth = [PeakParams { center_freq: 12.0, amplitude: 0.4, bandwidth: 1.5 }];
    let result = fit(&knee_synth(&truth), &knee_config()).unwrap();

    assert!(!result.is_partial());
    assert!((result.aperiodic.offset - 2.0).abs() < 0.02, "{:?}", result.aperiodic);
    assert!((result.aperiodic.exponent - 2.0).abs() < 0.02, "{:?}", result.aperiodic);
    let knee = result.aperiodic.knee.unwrap();
    assert!((knee - 50.0).abs() < 1.0, "knee = {knee}");

    assert_eq!(result.peaks.len(), 1, "{:?}", result.peaks);
    let got = &result.peaks[0];
    assert!((got.center_freq - 12.0).abs() < 0.05, "{got:?}");
    assert!((got.amplitude - 0.4).abs() < 0.02, "{got:?}");
    assert!((got.bandwidth - 1.5).abs() < 0.05, "{got:?}");
}

#[test]
fn noisy_batch_converges_without_partial_fits() {
    let ap = AperiodicParams { offset: 1.0, exponent: 1.5, knee: None };
    let (freqs, spectra) =
        gen_group_power_spectra(40, (1.0, 50.0), &ap, &two_peaks(), 0.05, 0, 0.25).unwrap();
    let config = FitConfig {
        max_n_peaks: Some(6),
        ..FitConfig::default()
    };

    let group = fit_group(&freqs, &spectra, &config);

    assert_eq!(group.n_ok(), 40);
    let partial: Vec<usize> = group
        .successes()
        .filter(|(_, r)| r.is_partial())
        .map(|(i, _)| i)
        .collect();
    assert!(partial.is_empty(), "partial fits at {partial:?}");
}

#[test]
fn narrow_range_is_a_range_error() {
    let config = FitConfig {
        freq_range: Some((10.0, 12.0)),
        ..config()
    };
    let err = fit(&synth(&background(), &two_peaks(), 0.0, 0), &config).unwrap_err();
    assert!(matches!(err, FitError::Range(_)), "{err:?}");
}

#[test]
fn trimmed_fit_reports_actual_range() {
    let config = FitConfig {
        freq_range: Some((5.0, 30.0)),
        ..config()
    };
    let result = fit(&synth(&background(), &two_peaks(), 0.0, 0), &config).unwrap();
    assert_eq!(result.freq_range, (5.0, 30.0));
    assert!((result.freq_res - 0.5).abs() < 1e-12);
}

#[test]
fn malformed_spectrum_is_isolated_in_a_batch() {
    let (freqs, mut spectra) =
        gen_group_power_spectra(5, (3.0, 40.0), &background(), &two_peaks(), 0.0, 0, 0.5).unwrap();
    spectra[2][10] = 0.0;

    let group = fit_group(&freqs, &spectra, &config());

    assert_eq!(group.n_ok(), 4);
    assert_eq!(group.n_failed(), 1);
    assert!(matches!(group.results[2], Err(FitError::Range(_))));
    for (i, r) in group.successes() {
        assert_ne!(i, 2);
        assert_eq!(r.peaks.len(), 2);
    }
}

#[test]
fn record_round_trips_through_json() {
    let result = fit(&synth(&background(), &two_peaks(), 0.0, 0), &config()).unwrap();
    let json = serde_json::to_string(&result.to_record()).unwrap();
    let record: specfit::FitRecord = serde_json::from_str(&json).unwrap();

    assert_eq!(record.schema_version, 1);
    assert_eq!(record.peaks.len(), result.peaks.len());
    assert!(!json.contains("knee"));
    for (p, q) in record.to_result().peaks.iter().zip(result.peaks.iter()) {
        assert!((p.center_freq - q.center_freq).abs() < 1e-12);
        assert!((p.amplitude - q.amplitude).abs() < 1e-12);
        assert!((p.bandwidth - q.bandwidth).abs() < 1e-12);
    }
}
