//! Goodness-of-fit statistics.

use crate::math::mean;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitQuality {
    /// Coefficient of determination, in `[0, 1]`.
    pub r_squared: f64,
    /// Mean absolute error (log10 power).
    pub fit_error: f64,
}

/// Compare a model curve against the data it was fitted to.
///
/// For a constant spectrum (`SS_tot = 0`) `r_squared` is 1 when the model is
/// exact and 0 otherwise.
pub fn evaluate(log_power: &[f64], model: &[f64]) -> FitQuality {
    let n = log_power.len().min(model.len());
    if n == 0 {
        return FitQuality {
            r_squared: 0.0,
            fit_error: 0.0,
        };
    }
    let y = &log_power[..n];
    let m = &model[..n];

    let fit_error = y.iter().zip(m).map(|(a, b)| (a - b).abs()).sum::<f64>() / n as f64;

    let y_mean = mean(y);
    let ss_res: f64 = y.iter().zip(m).map(|(a, b)| (a - b) * (a - b)).sum();
    let ss_tot: f64 = y.iter().map(|a| (a - y_mean) * (a - y_mean)).sum();

    let r_squared = if ss_tot > 0.0 {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    FitQuality {
        r_squared,
        fit_error,
    }
}
