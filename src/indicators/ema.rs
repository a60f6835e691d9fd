// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Formula:
//   alpha = 2 / (span + 1)
//   EMA_0 = x_0
//   EMA_t = x_t * alpha + EMA_{t-1} * (1 - alpha)
//
// The recursion is seeded with the first value, not with an SMA of the first
// `span` values, so the output has one entry per input.
// =============================================================================

/// Smoothing factor for a given span.
pub fn alpha(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// Compute the first-value-seeded EMA of `values`.
///
/// # Edge cases
/// - empty input => empty vec
/// - `span == 0` => empty vec (alpha would exceed 1)
pub fn calculate_ema(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 || values.is_empty() {
        return Vec::new();
    }

    let a = alpha(span);
    let mut result = Vec::with_capacity(values.len());
    let mut prev = values[0];
    result.push(prev);

    for &v in &values[1..] {
        prev = v * a + prev * (1.0 - a);
        result.push(prev);
    }

    result
}
