// Rolling-window and order statistics shared by the indicators.

/// Trailing simple moving average over `window` entries.
///
/// An output entry is defined only when all `window` inputs ending at that
/// index are defined.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }

    for end in window - 1..values.len() {
        let slice = &values[end + 1 - window..=end];
        let sum: Option<f64> = slice.iter().copied().sum();
        out[end] = sum.map(|s| s / window as f64);
    }

    out
}

/// Trailing minimum over `window` entries; `None` before the window fills.
pub fn rolling_min(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling_fold(values, window, f64::INFINITY, f64::min)
}

/// Trailing maximum over `window` entries; `None` before the window fills.
pub fn rolling_max(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling_fold(values, window, f64::NEG_INFINITY, f64::max)
}

fn rolling_fold(values: &[f64], window: usize, init: f64, f: fn(f64, f64) -> f64) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }
    for end in window - 1..values.len() {
        out[end] = Some(values[end + 1 - window..=end].iter().copied().fold(init, f));
    }
    out
}

/// Percentile `q` in `[0, 1]` with linear interpolation between the closest
/// ranks. Non-finite inputs are ignored; `None` when nothing is left.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;

    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_mean_waits_for_window() {
        let values = vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        let out = rolling_mean(&values, 3);
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn rolling_mean_propagates_gaps() {
        let values = vec![None, Some(2.0), Some(4.0), Some(6.0)];
        let out = rolling_mean(&values, 2);
        assert_eq!(out, vec![None, None, Some(3.0), Some(5.0)]);
    }

    #[test]
    fn rolling_extremes() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert_eq!(rolling_min(&values, 3), vec![None, None, Some(1.0), Some(1.0), Some(1.0)]);
        assert_eq!(rolling_max(&values, 3), vec![None, None, Some(4.0), Some(4.0), Some(5.0)]);
    }

    #[test]
    fn percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 0.5), Some(3.0));
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 1.0), Some(5.0));
        // pos = 0.85 * 4 = 3.4
        assert!((percentile(&values, 0.85).unwrap() - 4.4).abs() < 1e-12);
    }

    #[test]
    fn percentile_empty() {
        assert_eq!(percentile(&[], 0.5), None);
        assert_eq!(percentile(&[f64::NAN], 0.5), None);
    }
}
