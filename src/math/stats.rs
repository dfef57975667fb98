//! Small summary statistics over slices.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Percentile `q` in `[0, 100]` with linear interpolation between order statistics.
///
/// Returns `None` for empty input.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let q = q.clamp(0.0, 100.0);
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Index of the largest value among entries where `mask[i]` is false.
///
/// Ties resolve to the lowest index. Returns `None` when every entry is masked.
pub fn argmax_unmasked(values: &[f64], mask: &[bool]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, (&v, &masked)) in values.iter().zip(mask.iter()).enumerate() {
        if masked || !v.is_finite() {
            continue;
        }
        match best {
            Some(b) if values[b] >= v => {}
            _ => best = Some(i),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates_linearly() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&v, 0.0), Some(1.0));
        assert_eq!(percentile(&v, 100.0), Some(4.0));
        assert!((percentile(&v, 50.0).unwrap() - 2.5).abs() < 1e-12);
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn std_dev_is_population_form() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&v) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn argmax_skips_masked_entries() {
        let v = [1.0, 5.0, 3.0, 5.0];
        assert_eq!(argmax_unmasked(&v, &[false; 4]), Some(1));
        assert_eq!(argmax_unmasked(&v, &[false, true, false, false]), Some(3));
        assert_eq!(argmax_unmasked(&v, &[true; 4]), None);
    }
}
