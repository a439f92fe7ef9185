// =============================================================================
// Average True Range (ATR) — Wilder's Smoothing Method
// =============================================================================
//
//   TR    = max(H - L, |H - prevClose|, |L - prevClose|)
//   ATR_0 = SMA of the first `period` TR values
//   ATR_t = (ATR_{t-1} * (period - 1) + TR_t) / period
// =============================================================================

use crate::types::Candle;

/// Most recent ATR over `candles` (oldest first).
///
/// `None` when `period` is zero, there are fewer than `period + 1` candles, or
/// any intermediate value is non-finite.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let tr_values: Vec<f64> = candles
        .windows(2)
        .map(|pair| true_range(&pair[1], pair[0].close))
        .collect();

    let period_f = period as f64;
    let mut atr = tr_values[..period].iter().sum::<f64>() / period_f;
    if !atr.is_finite() {
        return None;
    }

    for &tr in &tr_values[period..] {
        atr = (atr * (period_f - 1.0) + tr) / period_f;
        if !atr.is_finite() {
            return None;
        }
    }

    Some(atr)
}

/// NaN in, NaN out: `f64::max` would otherwise swallow a NaN operand.
fn true_range(candle: &Candle, prev_close: f64) -> f64 {
    if !(candle.high.is_finite() && candle.low.is_finite() && prev_close.is_finite()) {
        return f64::NAN;
    }
    let hl = candle.high - candle.low;
    let hc = (candle.high - prev_close).abs();
    let lc = (candle.low - prev_close).abs();
    hl.max(hc).max(lc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: 0,
            open: close,
            high,
            low,
            close,
            volume: None,
        }
    }

    #[test]
    fn needs_period_plus_one_bars() {
        let bars = vec![bar(0.46, 0.44, 0.45); 15];
        assert!(calculate_atr(&bars, 0).is_none());
        assert!(calculate_atr(&bars[..14], 14).is_none());
        assert!(calculate_atr(&bars, 14).is_some());
    }

    #[test]
    fn steady_range_gives_that_range() {
        let bars = vec![bar(0.46, 0.44, 0.45); 40];
        let atr = calculate_atr(&bars, 14).unwrap();
        assert!((atr - 0.02).abs() < 1e-9, "got {atr}");
    }

    #[test]
    fn true_range_spans_overnight_gap() {
        // Gap up from 0.40 to a 0.50-0.52 bar: TR = 0.52 - 0.40.
        assert!((true_range(&bar(0.52, 0.50, 0.51), 0.40) - 0.12).abs() < 1e-12);
        // Gap down: TR = prev close - low.
        assert!((true_range(&bar(0.42, 0.40, 0.41), 0.50) - 0.10).abs() < 1e-12);
    }

    #[test]
    fn wilder_smoothing_after_seed() {
        // TRs: 2, 2, 8 with period 2 -> seed 2, then (2 * 1 + 8) / 2 = 5.
        let bars = vec![
            bar(11.0, 9.0, 10.0),
            bar(11.0, 9.0, 10.0),
            bar(11.0, 9.0, 10.0),
            bar(18.0, 10.0, 17.0),
        ];
        let atr = calculate_atr(&bars, 2).unwrap();
        assert!((atr - 5.0).abs() < 1e-12, "got {atr}");
    }

    #[test]
    fn non_finite_bar_poisons_result() {
        let mut bars = vec![bar(0.46, 0.44, 0.45); 20];
        bars[10].low = f64::NAN;
        assert!(calculate_atr(&bars, 14).is_none());
    }
}
