// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================

/// Mean of the last `period` values.
///
/// `None` when `period == 0`, there are fewer than `period` values, or the
/// window holds a non-finite value.
pub fn latest_sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    mean.is_finite().then_some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_insufficient_data() {
        assert!(latest_sma(&[1.0, 2.0], 3).is_none());
        assert!(latest_sma(&[1.0, 2.0], 0).is_none());
        assert!(latest_sma(&[], 1).is_none());
    }

    #[test]
    fn sma_uses_only_trailing_window() {
        assert_eq!(latest_sma(&[100.0, 1.0, 2.0, 3.0, 4.0, 5.0], 3), Some(4.0));
        assert_eq!(latest_sma(&[2.0, 4.0, 6.0], 3), Some(4.0));
    }

    #[test]
    fn sma_non_finite_window_is_none() {
        assert!(latest_sma(&[1.0, f64::NAN, 3.0], 2).is_none());
        // A NaN outside the window does not matter.
        assert_eq!(latest_sma(&[f64::NAN, 1.0, 3.0], 2), Some(2.0));
    }
}
