// =============================================================================
// EMA — exponentially weighted mean, k = 2 / (period + 1)
// =============================================================================
//
// Seeded with the SMA of the first `period` values, so the first output lines
// up with input index `period - 1`.
// =============================================================================

/// Compute the EMA series of `values`.
///
/// Empty when `period == 0` or the input is shorter than `period`. A
/// non-finite intermediate value truncates the series.
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period + 1) as f64;

    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(values.len() - period + 1);
    result.push(seed);

    let mut prev = seed;
    for &value in &values[period..] {
        prev += k * (value - prev);
        if !prev.is_finite() {
            break;
        }
        result.push(prev);
    }

    result
}

/// Most recent EMA value, if the series is long enough.
pub fn latest_ema(values: &[f64], period: usize) -> Option<f64> {
    calculate_ema(values, period).last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_inputs_yield_nothing() {
        assert!(calculate_ema(&[], 9).is_empty());
        assert!(calculate_ema(&[0.45, 0.46, 0.47], 0).is_empty());
        assert!(calculate_ema(&[0.45, 0.46], 9).is_empty());
        assert!(latest_ema(&[0.45, 0.46], 9).is_none());
    }

    #[test]
    fn seed_is_simple_mean() {
        let ema = calculate_ema(&[0.40, 0.50, 0.60], 3);
        assert_eq!(ema.len(), 1);
        assert!((ema[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn recurrence_after_seed() {
        // period 3 -> k = 0.5, seed = mean(1, 2, 3) = 2
        let ema = calculate_ema(&[1.0, 2.0, 3.0, 6.0, 0.0], 3);
        assert_eq!(ema.len(), 3);
        assert!((ema[1] - 4.0).abs() < 1e-12);
        assert!((ema[2] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn non_finite_value_truncates() {
        let ema = calculate_ema(&[0.4, 0.5, 0.6, f64::INFINITY, 0.7], 3);
        assert_eq!(ema.len(), 1);
    }

    #[test]
    fn fast_leads_slow_in_uptrend() {
        let closes: Vec<f64> = (0..60).map(|i| 0.30 + i as f64 * 0.005).collect();
        let fast = latest_ema(&closes, 9).unwrap();
        let slow = latest_ema(&closes, 21).unwrap();
        assert!(fast > slow);
        assert!(fast < *closes.last().unwrap());
    }
}
